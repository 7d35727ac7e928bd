//! Periodic task set under a real-time policy
//!
//! Runs a small task set and prints one line per scheduling decision.
//! Tasks are given as `processing/period[/budget]`; a budget makes the task
//! a soft CBS server under EDF-CBS, otherwise it is hard real-time.
//!
//! ```text
//! realtime 2/5 3/10 4/20/2
//! ```
//!
//! # Environment Variables
//!
//! - `UTH_POLICY=<name>` - dm or edf-cbs (default: edf-cbs unless the
//!   build-time default is already a real-time policy)
//! - `UTH_MISS_ACTION=<stop|terminate>` - What a deadline miss does
//! - `UTH_HORIZON=<n>` - Stop after this many time units (default: 60)
//! - `UTH_JOBS=<n>` - Jobs per task, 0 for unlimited (default: 0)
//! - `UTH_TICK_US=<n>` - Pace against the wall clock, n microseconds per
//!   unit (default: 0, virtual time)

use std::time::Duration;

use uthread::{env_get, env_get_opt, kwarn};
use uthread::{
    yield_now, MissAction, PolicyKind, Runtime, RuntimeConfig, SchedParams, TickOutcome, Ticks,
    TimeSource, VirtualClock, WallClock,
};

#[derive(Debug, Clone, Copy)]
struct TaskSpec {
    processing: Ticks,
    period: Ticks,
    budget: Option<Ticks>,
}

fn parse_task(s: &str) -> Result<TaskSpec, String> {
    let fields: Vec<&str> = s.split('/').collect();
    let num = |i: usize| -> Result<Ticks, String> {
        fields[i]
            .trim()
            .parse::<Ticks>()
            .map_err(|e| format!("{}: {}", s, e))
    };
    match fields.len() {
        2 => Ok(TaskSpec { processing: num(0)?, period: num(1)?, budget: None }),
        3 => Ok(TaskSpec { processing: num(0)?, period: num(1)?, budget: Some(num(2)?) }),
        _ => Err(format!("{}: expected processing/period[/budget]", s)),
    }
}

fn params_for(spec: &TaskSpec, jobs: u32) -> SchedParams {
    let mut p = SchedParams::new(spec.processing).periodic(spec.period, spec.period);
    if let Some(budget) = spec.budget {
        p = p.cbs_budget(budget);
    }
    if jobs > 0 {
        p = p.jobs(jobs);
    }
    p
}

fn main() {
    let mut specs = Vec::new();
    for arg in std::env::args().skip(1) {
        match parse_task(&arg) {
            Ok(spec) => specs.push(spec),
            Err(e) => {
                eprintln!("bad task: {}", e);
                std::process::exit(2);
            }
        }
    }
    if specs.is_empty() {
        specs = vec![
            TaskSpec { processing: 2, period: 5, budget: None },
            TaskSpec { processing: 3, period: 10, budget: None },
            TaskSpec { processing: 4, period: 20, budget: Some(2) },
        ];
    }

    let horizon: Ticks = env_get("UTH_HORIZON", 60);
    let jobs: u32 = env_get("UTH_JOBS", 0);
    let tick_us: u64 = env_get("UTH_TICK_US", 0);

    let mut config = RuntimeConfig::from_env();
    if !config.policy.is_real_time() && env_get_opt::<String>("UTH_POLICY").is_none() {
        config = config.policy(PolicyKind::EdfCbs);
    }
    if !config.policy.is_real_time() {
        kwarn!("policy {} never reports deadline misses", config.policy);
    }
    let miss_action = config.miss_action;

    let mut runtime = match Runtime::new(config) {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let utilization: f64 = specs.iter().map(|s| s.processing as f64 / s.period as f64).sum();
    println!("=== {} task(s) under {}, U = {:.2} ===", specs.len(), runtime.policy(), utilization);

    for spec in &specs {
        let h = runtime
            .spawn(params_for(spec, jobs), || loop {
                yield_now();
            })
            .unwrap_or_else(|e| panic!("spawn failed: {}", e));
        println!("  thread {}: {:?}", h.id(), spec);
    }
    println!();

    let mut clock: Box<dyn TimeSource> = if tick_us > 0 {
        Box::new(WallClock::new(Duration::from_micros(tick_us)))
    } else {
        Box::new(VirtualClock::new())
    };

    let mut misses = 0u32;
    while runtime.thread_count() > 0 {
        let now = clock.now();
        if now >= horizon {
            break;
        }
        let outcome = runtime.tick(now);
        match outcome {
            TickOutcome::Ran { thread, allocated, consumed, end } => {
                println!("{:>5}  run  {:>3}  {}/{}  {:?}", now, thread.id(), consumed, allocated, end);
            }
            TickOutcome::Idle { duration } => println!("{:>5}  idle      {}", now, duration),
            TickOutcome::DeadlineMiss { thread } => {
                misses += 1;
                println!("{:>5}  MISS {:>3}", now, thread.id());
                match miss_action {
                    MissAction::Stop => break,
                    MissAction::Terminate => runtime.terminate(thread),
                }
            }
            TickOutcome::Empty => break,
        }
        clock.advance(outcome.elapsed());
    }

    println!("\nstopped at t={} with {} deadline miss(es)", clock.now(), misses);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task() {
        let t = parse_task("2/5").unwrap();
        assert_eq!((t.processing, t.period, t.budget), (2, 5, None));
        let t = parse_task("4/20/2").unwrap();
        assert_eq!(t.budget, Some(2));
        assert!(parse_task("4").is_err());
        assert!(parse_task("a/5").is_err());
    }

    #[test]
    fn test_params_for() {
        let spec = TaskSpec { processing: 4, period: 20, budget: Some(2) };
        let p = params_for(&spec, 3);
        assert!(p.cbs.is_soft());
        assert_eq!(p.deadline, 20);
        assert_eq!(p.instances, Some(2));
        assert!(p.validate().is_ok());
    }
}
