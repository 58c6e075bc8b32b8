use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::LocalSet;
use tokio::time::sleep;
use tripwire::{attach, attach_all, ConfigError, ConfigOption, Options, SignalHub, TripState};

type Log = Rc<RefCell<Vec<&'static str>>>;

/// Options whose test replays `outcomes` in order and logs each callback.
fn scripted(outcomes: Vec<bool>, log: &Log) -> Options<(), usize> {
    let (pass_log, fail_log) = (Rc::clone(log), Rc::clone(log));
    Options::new()
        .test(move |_, step| {
            let outcome = outcomes[*step];
            *step += 1;
            outcome
        })
        .pass(move |_, _| pass_log.borrow_mut().push("pass"))
        .fail(move |_, _| fail_log.borrow_mut().push("fail"))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

#[tokio::test(start_paused = true)]
async fn unthrottled_alternating_outcomes_fire_on_each_flip() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let hub = SignalHub::new();
            let log: Log = Rc::default();
            let watcher = attach(
                (),
                scripted(vec![true, true, false, false, true], &log).throttle(false),
                &hub,
            )
            .expect("attach");
            sleep(Duration::from_millis(1)).await;

            for _ in 0..4 {
                watcher.request();
            }
            assert_eq!(watcher.with_data(|step| *step), 5);
            assert_eq!(&*log.borrow(), &["pass", "fail", "pass"]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn throttled_burst_yields_one_pass() {
    LocalSet::new()
        .run_until(async {
            let hub = SignalHub::new();
            let log: Log = Rc::default();
            let watcher = attach((), scripted(vec![true; 4], &log).throttle(50u64), &hub)
                .expect("attach");

            // t=0 is absorbed by the warm-up; t=10,20,30 coalesce into one
            // deferred run at t=50.
            for _ in 0..4 {
                watcher.request();
                sleep(Duration::from_millis(10)).await;
            }
            sleep(Duration::from_millis(30)).await;

            assert_eq!(watcher.with_data(|step| *step), 2);
            assert_eq!(&*log.borrow(), &["pass"]);
        })
        .await;
}

#[test]
fn missing_test_fails_at_attach() {
    let hub = SignalHub::new();
    let err = attach((), Options::<(), ()>::new().pass(|_, _| {}), &hub).unwrap_err();
    assert_eq!(
        err,
        ConfigError::Missing {
            option: ConfigOption::Test
        }
    );
    assert!(err.to_string().contains("test"));
    assert_eq!(hub.subscriber_count(), 0);
}

#[test]
fn missing_pass_fails_at_attach() {
    let hub = SignalHub::new();
    let err = attach((), Options::<(), ()>::new().test(|_, _| true), &hub).unwrap_err();
    assert_eq!(err.option(), ConfigOption::Pass);
}

#[tokio::test(start_paused = true)]
async fn initial_failure_fires_fail_once_then_pass() {
    LocalSet::new()
        .run_until(async {
            let hub = SignalHub::new();
            let log: Log = Rc::default();
            let watcher = attach((), scripted(vec![false, false, true], &log).throttle(false), &hub)
                .expect("attach");
            sleep(Duration::from_millis(1)).await;
            assert_eq!(&*log.borrow(), &["fail"]);
            assert_eq!(watcher.trip(), TripState::Failing);

            watcher.request();
            assert_eq!(&*log.borrow(), &["fail"]);

            watcher.request();
            assert_eq!(&*log.borrow(), &["fail", "pass"]);
            assert_eq!(watcher.trip(), TripState::Passing);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn init_data_seeds_before_first_test() {
    LocalSet::new()
        .run_until(async {
            let hub = SignalHub::new();
            let options: Options<&str, Vec<String>> = Options::new()
                .init_data(|target: &&str, data: &mut Vec<String>| data.push(format!("seeded {target}")))
                .test(|_, data| {
                    data.push("tested".into());
                    true
                })
                .pass(|_, data| data.push("passed".into()));
            let watcher = attach("hero", options, &hub).expect("attach");
            assert!(watcher.with_data(|d| d.is_empty()));

            sleep(Duration::from_millis(1)).await;
            watcher.with_data(|d| assert_eq!(d, &["seeded hero", "tested", "passed"]));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn attach_all_gives_each_target_its_own_watcher() {
    LocalSet::new()
        .run_until(async {
            let hub = SignalHub::new();
            let passed: Rc<RefCell<Vec<u32>>> = Rc::default();
            let sink = Rc::clone(&passed);
            let options: Options<u32, ()> = Options::new()
                .throttle(false)
                .test(|target, _| target % 2 == 0)
                .pass(move |target, _| sink.borrow_mut().push(*target));

            let watchers = attach_all(1..=4, &options, &hub).expect("attach");
            assert_eq!(watchers.len(), 4);
            assert_eq!(hub.subscriber_count(), 4);

            sleep(Duration::from_millis(1)).await;
            assert_eq!(&*passed.borrow(), &[2, 4]);
            let trips: Vec<TripState> = watchers.iter().map(|w| w.trip()).collect();
            assert_eq!(
                trips,
                vec![
                    TripState::Failing,
                    TripState::Passing,
                    TripState::Failing,
                    TripState::Passing
                ]
            );
        })
        .await;
}

#[test]
fn attach_all_rejects_invalid_options_without_attaching() {
    let hub = SignalHub::new();
    let options: Options<u32, ()> = Options::new().test(|_, _| true);
    let err = attach_all(0..3, &options, &hub).unwrap_err();
    assert_eq!(err.option(), ConfigOption::Pass);
    assert_eq!(hub.subscriber_count(), 0);
}
