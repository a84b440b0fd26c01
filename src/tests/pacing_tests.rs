//! tests/pacing_tests.rs
//! Esperas cancelables y demoras aleatorias.

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use chrono::Local;

    use crate::services::pacing::{
        secs_to_duration, CancelFlag, PacingController, WaitOutcome, MAX_DELAY_SECS,
    };

    #[test]
    fn test_pick_delay_stays_in_range() {
        for _ in 0..200 {
            let d = PacingController::pick_delay(0.2, 0.4).as_secs_f64();
            assert!((0.2..=0.4).contains(&d), "fuera de rango: {}", d);
        }
        // Rango invertido se normaliza
        let d = PacingController::pick_delay(0.4, 0.2).as_secs_f64();
        assert!((0.2..=0.4).contains(&d));
        assert_eq!(PacingController::pick_delay(0.0, 0.0), Duration::ZERO);
        assert_eq!(PacingController::pick_delay(-3.0, -1.0), Duration::ZERO);
    }

    #[test]
    fn test_huge_or_invalid_delays_are_capped() {
        let cap = Duration::from_secs_f64(MAX_DELAY_SECS);
        assert_eq!(PacingController::pick_delay(1e300, 1e300), cap);
        assert!(PacingController::pick_delay(0.0, f64::INFINITY) <= cap);
        assert_eq!(PacingController::pick_delay(f64::NAN, f64::NAN), Duration::ZERO);
        assert_eq!(secs_to_duration(f64::NEG_INFINITY), Duration::ZERO);
        assert_eq!(secs_to_duration(1.5), Duration::from_millis(1500));
    }

    #[actix_rt::test]
    async fn test_wait_completes_without_cancel() {
        let pacing = PacingController::new(Duration::from_millis(10));
        let flag = CancelFlag::new();
        let start = Instant::now();
        let outcome = pacing.wait_for(Duration::from_millis(50), &flag).await;
        assert_eq!(outcome, WaitOutcome::Completed);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[actix_rt::test]
    async fn test_cancel_returns_within_one_increment() {
        let increment = Duration::from_millis(500);
        let pacing = PacingController::new(increment);
        let flag = CancelFlag::new();

        let remote = flag.clone();
        let stop_after = Duration::from_millis(120);
        tokio::spawn(async move {
            tokio::time::sleep(stop_after).await;
            remote.cancel();
        });

        let start = Instant::now();
        let outcome = pacing.wait_for(Duration::from_secs(30), &flag).await;
        let elapsed = start.elapsed();

        assert_eq!(outcome, WaitOutcome::Cancelled);
        let latency = elapsed.saturating_sub(stop_after);
        assert!(
            latency <= increment + Duration::from_millis(150),
            "la espera tardó {:?} en notar la cancelación",
            latency
        );
    }

    #[actix_rt::test]
    async fn test_already_cancelled_returns_immediately() {
        let pacing = PacingController::new(Duration::from_millis(500));
        let flag = CancelFlag::new();
        flag.cancel();
        let start = Instant::now();
        assert_eq!(
            pacing.wait_between_sends(10.0, 20.0, &flag).await,
            WaitOutcome::Cancelled
        );
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[actix_rt::test]
    async fn test_wait_until_past_time_completes() {
        let pacing = PacingController::new(Duration::from_millis(10));
        let flag = CancelFlag::new();
        let past = Local::now().naive_local() - chrono::Duration::seconds(5);
        assert_eq!(pacing.wait_until(past, &flag).await, WaitOutcome::Completed);
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let pacing = PacingController::new(Duration::ZERO);
        assert!(pacing.poll_interval() >= Duration::from_millis(10));
    }
}
