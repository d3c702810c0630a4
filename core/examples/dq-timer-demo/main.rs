use clap::Parser;
use delta_timer_core_rs::timer::{Config, ConfigOption, TimerCallback, TimerService};
use delta_timer_utils_rs::concurrent::CountDownLatch;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
  /// Tick period, e.g. `1ms` or `500us`.
  #[clap(long, default_value = "1ms", value_parser = humantime::parse_duration)]
  resolution: Duration,

  /// Timer intervals in ticks, one timer per value.
  #[clap(long, value_delimiter = ',', default_value = "100,200,50,135")]
  intervals: Vec<u64>,

  /// Give up waiting after this long.
  #[clap(long, default_value = "10s", value_parser = humantime::parse_duration)]
  timeout: Duration,
}

struct Slot {
  index: usize,
  latch: CountDownLatch,
}

#[tokio::main]
async fn main() {
  env::set_var("RUST_LOG", "dq_timer_demo=info,delta_timer_core_rs=debug");
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let args = Args::parse();
  let service = TimerService::<Slot>::start(Config::from([ConfigOption::with_resolution(args.resolution)]))
    .unwrap_or_else(|error| panic!("failed to start the timer service: {}", error));

  let latch = CountDownLatch::new(args.intervals.len());
  let callback: TimerCallback<Slot> = Arc::new(|slot: &Slot| {
    tracing::info!("Timer expired at Slot {}, Context = {}", slot.index, slot.index);
    slot.latch.count_down();
  });

  for (index, interval) in args.intervals.iter().copied().enumerate() {
    let context = Arc::new(Slot {
      index: index + 1,
      latch: latch.clone(),
    });
    match service.create_with_callback(interval, callback.clone(), context) {
      Ok(handle) => tracing::info!("created {} with interval {}", handle, interval),
      Err(error) => {
        tracing::error!("failed to create timer {}: {}", index + 1, error);
        latch.count_down();
      }
    }
  }
  if let Err(error) = service.dump() {
    tracing::error!("dump failed: {}", error);
  }

  if latch.wait_timeout(args.timeout).await {
    tracing::info!("all timers expired");
  } else {
    tracing::warn!("{} timers still pending after {:?}", latch.count(), args.timeout);
  }

  if let Err(error) = service.deinit() {
    tracing::error!("deinit failed: {}", error);
  }
}
