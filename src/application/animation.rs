// Per-channel gauge animation tasks
use crate::domain::gauge::GaugeChannel;
use crate::domain::smoothing::{SmoothedValue, SpringParams};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub type GaugeReadout = BTreeMap<GaugeChannel, SmoothedValue>;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SmoothingSettings {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
    pub epsilon: f64,
    pub frame_ms: u64,
}

impl Default for SmoothingSettings {
    fn default() -> Self {
        let spring = SpringParams::default();
        Self {
            stiffness: spring.stiffness,
            damping: spring.damping,
            mass: spring.mass,
            epsilon: spring.epsilon,
            frame_ms: 16,
        }
    }
}

impl SmoothingSettings {
    pub fn spring(&self) -> SpringParams {
        SpringParams {
            stiffness: self.stiffness,
            damping: self.damping,
            mass: self.mass,
            epsilon: self.epsilon,
        }
    }

    pub fn frame(&self) -> Duration {
        Duration::from_millis(self.frame_ms.max(1))
    }
}

/// Drives one animation task per gauge channel. Setting a new target
/// supersedes (aborts) the running task of that channel; a task ends by
/// itself once its spring settles.
pub struct GaugeAnimator {
    params: SpringParams,
    frame: Duration,
    readout: Arc<watch::Sender<GaugeReadout>>,
    tasks: HashMap<GaugeChannel, JoinHandle<()>>,
}

impl GaugeAnimator {
    pub fn new(settings: &SmoothingSettings, readout: Arc<watch::Sender<GaugeReadout>>) -> Self {
        Self {
            params: settings.spring(),
            frame: settings.frame(),
            readout,
            tasks: HashMap::new(),
        }
    }

    pub fn set_target(&mut self, channel: GaugeChannel, target: f64) {
        self.cancel(channel);

        let epsilon = self.params.epsilon;
        let mut settled = false;
        self.readout.send_modify(|readout| {
            let value = readout.entry(channel).or_insert_with(|| SmoothedValue::at(0.0));
            value.target = target;
            settled = value.is_settled(epsilon);
            if settled {
                value.position = target;
                value.velocity = 0.0;
            }
        });
        if settled {
            return;
        }

        let params = self.params;
        let frame = self.frame;
        let readout = self.readout.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + frame, frame);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let mut done = true;
                readout.send_modify(|readout| {
                    if let Some(value) = readout.get_mut(&channel) {
                        done = value.step(&params);
                    }
                });
                if done {
                    tracing::trace!("Gauge {:?} settled", channel);
                    break;
                }
            }
        });
        self.tasks.insert(channel, task);
    }

    #[cfg(test)]
    pub fn is_animating(&self, channel: GaugeChannel) -> bool {
        self.tasks
            .get(&channel)
            .is_some_and(|task| !task.is_finished())
    }

    pub fn cancel(&mut self, channel: GaugeChannel) {
        if let Some(task) = self.tasks.remove(&channel) {
            task.abort();
        }
    }

    /// Abort every animation task.
    pub fn shutdown(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

impl Drop for GaugeAnimator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animator() -> (GaugeAnimator, watch::Receiver<GaugeReadout>) {
        let (tx, rx) = watch::channel(GaugeReadout::new());
        (GaugeAnimator::new(&SmoothingSettings::default(), Arc::new(tx)), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_animation_settles_and_task_ends() {
        let (mut animator, readout) = animator();
        animator.set_target(GaugeChannel::Rpm, 1.0);
        assert!(animator.is_animating(GaugeChannel::Rpm));

        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(!animator.is_animating(GaugeChannel::Rpm));
        let value = readout.borrow()[&GaugeChannel::Rpm];
        assert_eq!(value.position, 1.0);
        assert_eq!(value.velocity, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_target_supersedes_running_task() {
        let (mut animator, readout) = animator();
        animator.set_target(GaugeChannel::Load, 1.0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        let midway = readout.borrow()[&GaugeChannel::Load];
        assert!(midway.position > 0.0 && midway.position < 1.0);

        animator.set_target(GaugeChannel::Load, 0.25);
        tokio::time::sleep(Duration::from_secs(60)).await;

        let value = readout.borrow()[&GaugeChannel::Load];
        assert_eq!(value.target, 0.25);
        assert_eq!(value.position, 0.25);
        assert!(!animator.is_animating(GaugeChannel::Load));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_frame_updates() {
        let (mut animator, readout) = animator();
        animator.set_target(GaugeChannel::Temperature, 1.0);
        tokio::time::sleep(Duration::from_millis(100)).await;

        animator.shutdown();
        let frozen = readout.borrow()[&GaugeChannel::Temperature];
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(readout.borrow()[&GaugeChannel::Temperature], frozen);
        assert!(!animator.is_animating(GaugeChannel::Temperature));
    }

    #[test]
    fn test_target_equal_to_position_spawns_nothing() {
        let (mut animator, _readout) = animator();
        // No runtime needed: a settled channel never spawns a task
        animator.set_target(GaugeChannel::FuelFlow, 0.0);
        assert!(!animator.is_animating(GaugeChannel::FuelFlow));
    }
}
