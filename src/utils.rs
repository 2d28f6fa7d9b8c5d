use rand::Rng;
use std::time::Duration;

lazy_static! {
    pub static ref DEFAULT_ENDPOINT: String = {
        match std::env::var("LINKSHIELD_ENDPOINT") {
            Ok(endpoint) if !endpoint.is_empty() => endpoint,
            _ => "http://localhost:8000/predict".into(),
        }
    };
}

pub fn jitter(duration: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let rndm = rng.gen_range(0.5..1.5);
    duration.mul_f64(rndm)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn jitter_stays_near_the_base_duration() {
        let base = Duration::from_millis(100);
        for _ in 0..20 {
            let jittered = jitter(base);
            assert!(jittered >= Duration::from_millis(50));
            assert!(jittered < Duration::from_millis(150));
        }
    }
}
