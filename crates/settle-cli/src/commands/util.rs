use rayon::ThreadPoolBuilder;
use tracing::debug;

/// Thread count for "auto", "0" or an explicit count.
fn thread_count(spec: &str) -> usize {
    match spec.trim() {
        s if s.eq_ignore_ascii_case("auto") => num_cpus::get(),
        s => match s.parse::<usize>() {
            Ok(0) | Err(_) => num_cpus::get(),
            Ok(n) => n,
        },
    }
}

/// Size the global rayon pool. Returns whether this call installed it; a
/// pool installed earlier in the process is kept.
pub fn configure_threads(spec: &str) -> bool {
    let count = thread_count(spec);
    match ThreadPoolBuilder::new().num_threads(count).build_global() {
        Ok(()) => true,
        Err(err) => {
            debug!(
                requested = count,
                current = rayon::current_num_threads(),
                "global thread pool already configured: {err}"
            );
            false
        }
    }
}

pub fn parse_grid_areas(spec: &str) -> Vec<String> {
    spec.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_spec_falls_back_to_cpu_count() {
        assert_eq!(thread_count("3"), 3);
        assert_eq!(thread_count(" AUTO "), num_cpus::get());
        assert_eq!(thread_count("0"), num_cpus::get());
        assert_eq!(thread_count("many"), num_cpus::get());
    }

    #[test]
    fn second_pool_configuration_is_reported_not_fatal() {
        configure_threads("2");
        // the global pool now exists, whoever installed it
        assert!(!configure_threads("4"));
    }

    #[test]
    fn grid_areas_ignore_blanks() {
        assert_eq!(parse_grid_areas(" 500, ,501,"), vec!["500", "501"]);
        assert!(parse_grid_areas("").is_empty());
    }
}
