use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;

/// Periodic liveness frame attached to one open socket.
///
/// The first frame fires one full period after the socket opens. Dropping the
/// timer stops it.
#[derive(Debug)]
pub struct KeepAliveTimer {
    interval: Interval,
    frame: Message,
}

impl KeepAliveTimer {
    pub fn start(period: Duration, frame: Message) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, frame }
    }

    /// Waits for the next period and returns the frame to send. Cancel safe.
    pub async fn tick(&mut self) -> Message {
        self.interval.tick().await;
        self.frame.clone()
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}
