//! Dispatch-order guarantees: strict FIFO processing, reentrant dispatch,
//! and batch non-interference.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use corriente::{Application, Command, Dispatcher, FnBridge, Runtime, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Label(&'static str);

/// Records every reducer call as `label@model`, where the model counts the
/// messages processed before it, so the log shows exactly which model each
/// message saw.
struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
    /// When the trigger label arrives, attach a command that resolves to the
    /// result label after the delay.
    delayed: Option<(&'static str, Duration, &'static str)>,
}

impl Application for Recorder {
    type Model = u64;
    type Message = Label;

    fn init(&self) -> Transition<u64, Label> {
        self.log.lock().unwrap().push("init".to_string());
        Transition::model(0)
    }

    fn update(&self, model: u64, message: Label) -> Transition<u64, Label> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}@{model}", message.0));
        let next = model + 1;
        match self.delayed {
            Some((trigger, delay, result)) if trigger == message.0 => Transition::with_command(
                next,
                Command::named("delayed", async move {
                    tokio::time::sleep(delay).await;
                    Label(result)
                }),
            ),
            _ => Transition::model(next),
        }
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(condition(), "condition not met before deadline");
}

/// Test that messages are processed exactly once, in dispatch order, each
/// seeing the model the previous call produced.
#[tokio::test]
async fn test_messages_are_processed_in_dispatch_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let runtime = Runtime::new(Recorder {
        log: log.clone(),
        delayed: None,
    });
    let handle = runtime.handle();

    handle.dispatch(Label("a"));
    handle.dispatch(Label("b"));
    handle.dispatch(Label("c"));
    handle.shutdown();
    runtime.run().await;

    assert_eq!(*log.lock().unwrap(), ["init", "a@0", "b@1", "c@2"]);
}

/// Test that dispatch from inside a render pass is queued behind the
/// messages already dispatched, never processed reentrantly.
#[tokio::test(start_paused = true)]
async fn test_reentrant_dispatch_is_queued_not_interleaved() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let dispatcher_slot: Arc<Mutex<Option<Dispatcher<Label>>>> = Arc::new(Mutex::new(None));
    let fired = Arc::new(AtomicBool::new(false));

    let bridge = {
        let dispatcher_slot = dispatcher_slot.clone();
        let fired = fired.clone();
        FnBridge(move |model: &u64| {
            // The render pass for the first processed message dispatches
            // synchronously, exactly once.
            if *model == 1 && !fired.swap(true, Ordering::SeqCst) {
                if let Some(dispatcher) = dispatcher_slot.lock().unwrap().as_ref() {
                    dispatcher.dispatch(Label("reentrant"));
                }
            }
        })
    };

    let runtime = Runtime::with_render_bridge(
        Recorder {
            log: log.clone(),
            delayed: None,
        },
        bridge,
    );
    *dispatcher_slot.lock().unwrap() = Some(runtime.dispatcher());
    let handle = runtime.handle();

    handle.dispatch(Label("a"));
    handle.dispatch(Label("b"));
    let runner = tokio::spawn(runtime.run());

    wait_until(|| log.lock().unwrap().len() >= 4).await;
    handle.shutdown();
    runner.await.unwrap();

    // The reentrant dispatch fired while "a" was being processed, so it
    // queues behind the already-dispatched "b".
    assert_eq!(
        *log.lock().unwrap(),
        ["init", "a@0", "b@1", "reentrant@2"]
    );
}

/// Test that message B's reducer runs right after A's returns, not after
/// A's async command settles.
#[tokio::test(start_paused = true)]
async fn test_reducers_never_wait_on_inflight_commands() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let runtime = Runtime::new(Recorder {
        log: log.clone(),
        delayed: Some(("a", Duration::from_millis(50), "result")),
    });
    let handle = runtime.handle();

    handle.dispatch(Label("a"));
    handle.dispatch(Label("b"));
    let runner = tokio::spawn(runtime.run());

    wait_until(|| log.lock().unwrap().len() >= 4).await;
    handle.shutdown();
    runner.await.unwrap();

    assert_eq!(*log.lock().unwrap(), ["init", "a@0", "b@1", "result@2"]);
}

/// Test that two runtimes in one process stay fully independent.
#[tokio::test]
async fn test_runtimes_do_not_share_state() {
    let first_log = Arc::new(Mutex::new(Vec::new()));
    let second_log = Arc::new(Mutex::new(Vec::new()));

    let first = Runtime::new(Recorder {
        log: first_log.clone(),
        delayed: None,
    });
    let second = Runtime::new(Recorder {
        log: second_log.clone(),
        delayed: None,
    });

    let first_handle = first.handle();
    let second_handle = second.handle();

    first_handle.dispatch(Label("one"));
    second_handle.dispatch(Label("two"));
    first_handle.shutdown();
    second_handle.shutdown();

    first.run().await;
    second.run().await;

    assert_eq!(*first_log.lock().unwrap(), ["init", "one@0"]);
    assert_eq!(*second_log.lock().unwrap(), ["init", "two@0"]);
}
