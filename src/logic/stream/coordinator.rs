use std::time::Duration;

use chrono::Utc;

use super::{AttackLogged, DefenseContext, SessionStats, StreamMessage, StreamPhase, Transport};
use crate::logic::features::FeatureGenerator;
use crate::AppResult;

/// Per-observer loop: sample, score, decide, attest, fan out, emit
pub struct StreamCoordinator {
    ctx: DefenseContext,
    generator: FeatureGenerator,
    interval: Duration,
    phase: StreamPhase,
    stats: SessionStats,
}

impl StreamCoordinator {
    pub fn new(ctx: DefenseContext, generator: FeatureGenerator, interval: Duration) -> Self {
        Self {
            ctx,
            generator,
            interval,
            phase: StreamPhase::Idle,
            stats: SessionStats::default(),
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// One pipeline pass; counters move only after a successful attestation
    pub async fn cycle(&mut self) -> AppResult<StreamMessage> {
        self.phase = StreamPhase::Sampling;
        let sample = self.generator.sample_with(self.ctx.attack.snapshot());

        self.phase = StreamPhase::Scoring;
        let vector = sample.vector();
        let detection = self.ctx.scorer.predict(&vector);

        self.phase = StreamPhase::Deciding;
        let mut attack_logged = None;
        if detection.label.is_confirmed() {
            self.phase = StreamPhase::Attesting;
            let record = self
                .ctx
                .attestor
                .attest(&vector, &detection, &sample.source_ip, sample.timestamp)
                .await?;

            let blocked = self.ctx.registry.record_block() as u64;
            self.stats.total_detected += 1;
            self.stats.total_blocked += blocked;
            self.ctx.stats.record_attack(blocked);

            attack_logged = Some(AttackLogged::from(&record));
        }

        self.phase = StreamPhase::Emitting;
        self.stats.cycles += 1;

        Ok(StreamMessage {
            traffic: sample,
            detection,
            timestamp: Utc::now(),
            attack_logged,
        })
    }

    /// Run until the transport closes; other errors end this session only
    pub async fn run<T: Transport>(mut self, mut transport: T) -> AppResult<SessionStats> {
        loop {
            // Cycle boundary: no new cycle starts for a departed observer
            if transport.is_closed() {
                return Ok(self.close());
            }

            let message = match self.cycle().await {
                Ok(message) => message,
                Err(e) => {
                    self.phase = StreamPhase::Closed;
                    tracing::error!("Stream session failed after {} cycles: {}", self.stats.cycles, e);
                    return Err(e);
                }
            };

            if transport.emit(message).await.is_err() {
                return Ok(self.close());
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = transport.closed() => return Ok(self.close()),
            }
        }
    }

    fn close(&mut self) -> SessionStats {
        self.phase = StreamPhase::Closed;
        tracing::info!(
            "Stream closed after {} cycles ({} detected, {} blocked)",
            self.stats.cycles,
            self.stats.total_detected,
            self.stats.total_blocked
        );
        self.stats
    }
}
