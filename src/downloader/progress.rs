use tokio::time::Instant;

/// 某一时刻对传输大小的一次读数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub observed_at: Instant,
    pub downloaded: u64,
    pub total: u64,
}

impl ProgressSample {
    pub fn new(observed_at: Instant, downloaded: u64, total: u64) -> Self {
        Self {
            observed_at,
            downloaded,
            total,
        }
    }

    pub fn now(downloaded: u64, total: u64) -> Self {
        Self::new(Instant::now(), downloaded, total)
    }
}

/// 采样结果
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurement {
    pub progress_pct: f64,
    pub speed_bps: f64,
}

/// 总大小未知时进度定义为 0
pub fn progress_pct(downloaded: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (downloaded as f64 / total as f64 * 100.0).min(100.0)
}

/// 由相邻两次读数计算进度和瞬时速度。
///
/// 没有上一次读数或者两次读数时间相同时，沿用 `last_speed`。
/// 大小回退（来源异常）时速度记为 0。
pub fn sample(previous: Option<&ProgressSample>, current: &ProgressSample, last_speed: f64) -> Measurement {
    let progress_pct = progress_pct(current.downloaded, current.total);

    let speed_bps = match previous {
        Some(prev) if current.observed_at > prev.observed_at => {
            let elapsed = current.observed_at.duration_since(prev.observed_at).as_secs_f64();
            current.downloaded.saturating_sub(prev.downloaded) as f64 / elapsed
        }
        _ => last_speed,
    };

    Measurement {
        progress_pct,
        speed_bps: speed_bps.max(0.0),
    }
}

/// 驱动方持有的上一次读数和速度
#[derive(Debug, Default)]
pub struct SpeedTracker {
    previous: Option<ProgressSample>,
    speed_bps: f64,
}

impl SpeedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, current: ProgressSample) -> Measurement {
        let measurement = sample(self.previous.as_ref(), &current, self.speed_bps);
        // 同一时刻的读数不替换基准点，否则下一次的时间差会被算小
        let same_tick = self
            .previous
            .is_some_and(|prev| prev.observed_at >= current.observed_at);
        if !same_tick {
            self.previous = Some(current);
        }
        self.speed_bps = measurement.speed_bps;
        measurement
    }

    pub fn speed_bps(&self) -> f64 {
        self.speed_bps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_progress_pct_bounds() {
        assert_eq!(progress_pct(0, 1000), 0.0);
        assert_eq!(progress_pct(250, 1000), 25.0);
        assert_eq!(progress_pct(1000, 1000), 100.0);
        for downloaded in (0..=777).step_by(37) {
            let pct = progress_pct(downloaded, 777);
            assert!((0.0..=100.0).contains(&pct));
        }
    }

    #[test]
    fn test_zero_total_is_zero_not_nan() {
        let pct = progress_pct(12345, 0);
        assert_eq!(pct, 0.0);
        assert!(!pct.is_nan());
    }

    #[test]
    fn test_first_sample_keeps_last_speed() {
        let cur = ProgressSample::now(100, 1000);
        assert_eq!(sample(None, &cur, 0.0).speed_bps, 0.0);
        assert_eq!(sample(None, &cur, 42.0).speed_bps, 42.0);
    }

    #[test]
    fn test_same_tick_keeps_last_speed() {
        let t = Instant::now();
        let prev = ProgressSample::new(t, 100, 1000);
        let cur = ProgressSample::new(t, 300, 1000);
        assert_eq!(sample(Some(&prev), &cur, 7.5).speed_bps, 7.5);
    }

    #[test]
    fn test_speed_is_delta_over_elapsed() {
        let t = Instant::now();
        let prev = ProgressSample::new(t, 0, 1000);
        let cur = ProgressSample::new(t + Duration::from_millis(500), 250, 1000);
        let m = sample(Some(&prev), &cur, 0.0);
        assert_eq!(m.speed_bps, 500.0);
        assert_eq!(m.progress_pct, 25.0);
    }

    #[test]
    fn test_speed_never_negative() {
        let t = Instant::now();
        let prev = ProgressSample::new(t, 800, 1000);
        let cur = ProgressSample::new(t + Duration::from_secs(1), 200, 1000);
        assert_eq!(sample(Some(&prev), &cur, 99.0).speed_bps, 0.0);

        // 时间顺序颠倒时沿用上次速度，也不会出现负数
        let m = sample(Some(&cur), &prev, 0.0);
        assert!(m.speed_bps >= 0.0);
    }

    #[test]
    fn test_tracker_uses_instantaneous_rate() {
        let t = Instant::now();
        let mut tracker = SpeedTracker::new();
        tracker.observe(ProgressSample::new(t, 0, 0));
        let m = tracker.observe(ProgressSample::new(t + Duration::from_secs(1), 1000, 0));
        assert_eq!(m.speed_bps, 1000.0);
        // 第二秒只下载了 100 字节，速度应该反映当前值而不是平均值
        let m = tracker.observe(ProgressSample::new(t + Duration::from_secs(2), 1100, 0));
        assert_eq!(m.speed_bps, 100.0);
        assert_eq!(m.progress_pct, 0.0);
    }

    #[test]
    fn test_tracker_same_tick_keeps_baseline() {
        let t = Instant::now();
        let mut tracker = SpeedTracker::new();
        tracker.observe(ProgressSample::new(t, 0, 0));
        tracker.observe(ProgressSample::new(t + Duration::from_secs(1), 100, 0));
        let m = tracker.observe(ProgressSample::new(t + Duration::from_secs(1), 150, 0));
        assert_eq!(m.speed_bps, 100.0);
        let m = tracker.observe(ProgressSample::new(t + Duration::from_secs(2), 300, 0));
        assert_eq!(m.speed_bps, 200.0);
    }
}
