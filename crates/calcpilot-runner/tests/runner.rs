//! Runner tests over a scripted desktop.

use async_trait::async_trait;
use calcpilot_agent::{
    DesktopBackend, Error, InterfaceMap, Launcher, Result, Session, TimingConfig, WindowInfo,
};
use calcpilot_runner::{Params, Runner, Script};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const MAP: &str = r#"{ "states": { "root": { "nodes": {
    "d2":  { "bbox": [0, 0, 10, 10],  "g_icon_name": "2 Button", "g_brief": "digit" },
    "d3":  { "bbox": [10, 0, 20, 10], "g_icon_name": "3 Button", "g_brief": "digit" },
    "add": { "bbox": [20, 0, 30, 10], "g_icon_name": "+ Button", "g_brief": "addition" },
    "eq":  { "bbox": [30, 0, 40, 10], "g_icon_name": "= Button", "g_brief": "equals" },
    "sq":  { "bbox": [40, 0, 50, 10], "g_icon_name": "x² Button", "g_brief": "square" }
} } } }"#;

#[derive(Default)]
struct Desktop {
    windows: Mutex<Vec<WindowInfo>>,
    clicks: AtomicUsize,
}

#[async_trait]
impl DesktopBackend for Desktop {
    async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(self.windows.lock().unwrap().clone())
    }

    async fn window_title(&self, id: &str) -> Result<Option<String>> {
        let windows = self.windows.lock().unwrap();
        Ok(windows.iter().find(|w| w.id == id).map(|w| w.title.clone()))
    }

    async fn focus(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn window_position(&self, id: &str) -> Result<Option<(i32, i32)>> {
        let windows = self.windows.lock().unwrap();
        Ok(windows.iter().find(|w| w.id == id).map(|w| (w.x, w.y)))
    }

    async fn click(&self, _x: i32, _y: i32) -> Result<bool> {
        self.clicks.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

/// Fails the first `failures` launches, then opens a window.
struct FlakyLauncher {
    desktop: Arc<Desktop>,
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl Launcher for FlakyLauncher {
    async fn launch(&self, _command: &str, _display: Option<&str>) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(Error::Launch("not ready".into()));
        }
        self.desktop.windows.lock().unwrap().push(WindowInfo {
            id: "7".into(),
            title: "Calculator".into(),
            x: 0,
            y: 0,
        });
        Ok("7".into())
    }
}

fn runner(script: &Script, launch_failures: usize) -> (Runner, Arc<Desktop>) {
    let desktop = Arc::new(Desktop::default());
    let launcher = Arc::new(FlakyLauncher {
        desktop: desktop.clone(),
        failures: launch_failures,
        calls: AtomicUsize::new(0),
    });
    let mut config = script.session.clone();
    config.timing = TimingConfig {
        poll_interval_ms: 1,
        ..TimingConfig::immediate()
    };
    let map = InterfaceMap::from_json(MAP).unwrap();
    let session = Session::new(config, map, desktop.clone(), launcher).unwrap();
    (Runner::new(session), desktop)
}

const SCRIPT: &str = r#"
name: "Square of a sum"
params:
  a:
    default: "2"
steps:
  - open
  - instruction: "add ${a} and 3 and then find the square of the result"
  - wait:
      ms: 1
  - log:
      message: "done"
  - click: "="
on_failure:
  retry:
    attempts: 2
    delay_ms: 1
"#;

#[tokio::test]
async fn test_run_script() {
    let script = Script::parse(SCRIPT).unwrap();
    let (mut runner, desktop) = runner(&script, 0);

    let result = runner.run(&script).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.steps_executed, 5);
    assert_eq!(result.clicks, 6);
    assert_eq!(result.retries, 0);
    assert_eq!(result.reports.len(), 1);
    assert_eq!(
        result.reports[0].sequence.labels(),
        vec!["2", "+", "3", "=", "square"]
    );
    assert_eq!(desktop.clicks.load(Ordering::SeqCst), 6);
    assert_eq!(runner.session().window().map(|w| w.id.as_str()), Some("7"));
}

#[tokio::test]
async fn test_retry_after_failed_open() {
    let script = Script::parse(SCRIPT).unwrap();
    let (mut runner, _) = runner(&script, 1);

    let result = runner.run(&script).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.retries, 1);
}

#[tokio::test]
async fn test_failed_instruction_fails_run() {
    let params = Params::new().set("a", "9");
    let script = Script::parse_with_params(SCRIPT, &params).unwrap();
    let (mut runner, _) = runner(&script, 0);

    let result = runner.run(&script).await;
    assert!(!result.success);
    assert_eq!(result.retries, 1);
    assert_eq!(result.steps_executed, 1);
    let error = result.error.unwrap();
    assert!(error.contains("add 9 and 3"), "{}", error);
    assert!(error.contains("not found in interface map"), "{}", error);
}
