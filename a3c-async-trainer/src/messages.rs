//! Messages sent from workers to the coordinator.
use a3c_core::{
    record::{Record, RecordValue},
    LossInfo,
};

/// Means of [`LossInfo`] over the synchronizations of an episode.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeDiagnostics {
    /// Mean loss.
    pub mean_loss: f32,

    /// Mean value loss.
    pub mean_value_loss: f32,

    /// Mean policy loss.
    pub mean_policy_loss: f32,

    /// Mean advantage.
    pub mean_advantage: f32,

    /// The number of gradient updates applied to the shared model.
    pub gradient_updates: usize,
}

impl EpisodeDiagnostics {
    /// Averages losses of synchronizations. Returns `None` if `losses` is empty.
    pub fn from_losses(losses: &[LossInfo]) -> Option<Self> {
        if losses.is_empty() {
            return None;
        }

        let n = losses.len() as f32;
        let mean = |f: fn(&LossInfo) -> f32| losses.iter().map(f).sum::<f32>() / n;
        Some(Self {
            mean_loss: mean(|l| l.loss),
            mean_value_loss: mean(|l| l.value_loss),
            mean_policy_loss: mean(|l| l.policy_loss),
            mean_advantage: mean(|l| l.advantage),
            gradient_updates: losses.len(),
        })
    }
}

/// Outcome of a completed episode.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultRecord {
    /// Worker that ran the episode.
    pub worker_id: usize,

    /// Value of the global episode counter after counting this episode.
    pub episode: usize,

    /// Sum of the rewards stored in the trajectory of the episode.
    pub reward: f32,

    /// Global running reward right after this episode.
    pub running_reward: f32,

    /// The number of environment steps.
    pub episode_length: usize,

    /// Loss statistics of the episode.
    pub diagnostics: Option<EpisodeDiagnostics>,
}

impl From<&ResultRecord> for Record {
    fn from(r: &ResultRecord) -> Self {
        let mut record = Record::from_slice(&[
            ("episode", RecordValue::Scalar(r.episode as f32)),
            ("reward", RecordValue::Scalar(r.reward)),
            ("running_reward", RecordValue::Scalar(r.running_reward)),
            ("episode_length", RecordValue::Scalar(r.episode_length as f32)),
            ("worker", RecordValue::String(format!("worker-{}", r.worker_id))),
        ]);

        if let Some(d) = &r.diagnostics {
            record.insert("loss", RecordValue::Scalar(d.mean_loss));
            record.insert("value_loss", RecordValue::Scalar(d.mean_value_loss));
            record.insert("policy_loss", RecordValue::Scalar(d.mean_policy_loss));
            record.insert("advantage", RecordValue::Scalar(d.mean_advantage));
            record.insert(
                "gradient_updates",
                RecordValue::Scalar(d.gradient_updates as f32),
            );
        }

        record
    }
}

/// Message on the results channel.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerMessage {
    /// An episode was completed.
    Result(ResultRecord),

    /// The worker stops and sends nothing more.
    Shutdown {
        /// Worker that stops.
        worker_id: usize,
    },
}
