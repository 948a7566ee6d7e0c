use std::time::Duration;

use log::{info, warn};

use crate::exec::run_shell;
use crate::geometry::Rect;

pub const DEFAULT_OVERLAY_PACKAGE: &str = "com.mycompany.hintoverlay";
const OVERLAY_ACTIVITY: &str = "org.kivy.android.PythonActivity";

pub trait HintOverlay {
    /// Puts `text` on screen over `bounds`. Never fails the caller.
    fn show(&mut self, bounds: Rect, text: &str);
}

pub struct AdbOverlay {
    package: String,
    launcher: String,
    timeout: Duration,
}

impl AdbOverlay {
    pub fn new(package: impl Into<String>, timeout: Duration) -> Self {
        Self {
            package: package.into(),
            launcher: "adb".to_string(),
            timeout,
        }
    }
}

impl HintOverlay for AdbOverlay {
    fn show(&mut self, bounds: Rect, text: &str) {
        let args = overlay_args(&self.package, bounds, text);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match run_shell(&self.launcher, &args, None, self.timeout) {
            Ok(_) => info!("overlay shown at {:?}", bounds.as_array()),
            Err(err) => warn!("overlay launch failed: {err}"),
        }
    }
}

/// Only logs; for runs without the overlay app installed.
pub struct LogOverlay;

impl HintOverlay for LogOverlay {
    fn show(&mut self, bounds: Rect, text: &str) {
        info!("overlay (disabled) {:?}: {text}", bounds.as_array());
    }
}

/// Arguments for `adb` that start the overlay activity. The text and bounds
/// extras are single-quoted for the device-side shell.
pub fn overlay_args(package: &str, bounds: Rect, text: &str) -> Vec<String> {
    let [left, top, right, bottom] = bounds.as_array();
    vec![
        "shell".to_string(),
        "am".to_string(),
        "start".to_string(),
        "-n".to_string(),
        format!("{package}/{OVERLAY_ACTIVITY}"),
        "-e".to_string(),
        "text".to_string(),
        remote_quote(&text.replace(' ', "-")),
        "-e".to_string(),
        "bounds".to_string(),
        remote_quote(&format!("{left},{top},{right},{bottom}")),
    ]
}

fn remote_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Instant;
    use tempfile::tempdir;

    #[test]
    fn builds_activity_launch() {
        let args = overlay_args(
            DEFAULT_OVERLAY_PACKAGE,
            Rect::new(100, 200, 300, 250),
            "Enter your email",
        );
        assert_eq!(
            args.join(" "),
            "shell am start -n com.mycompany.hintoverlay/org.kivy.android.PythonActivity \
             -e text 'Enter-your-email' -e bounds '100,200,300,250'"
        );
    }

    #[test]
    fn quotes_apostrophes() {
        let args = overlay_args("pkg", Rect::ZERO, "Your friend's name");
        assert_eq!(args[7], "'Your-friend'\\''s-name'");
        assert_eq!(args[10], "'0,0,0,0'");
    }

    #[test]
    fn launcher_receives_args_verbatim() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("args.txt");
        let mut overlay = AdbOverlay {
            package: "pkg".to_string(),
            launcher: format!("sh -c 'printf \"%s|\" \"$@\" > \"$0\"' '{}'", out.display()),
            timeout: Duration::from_secs(10),
        };
        overlay.show(Rect::new(1, 2, 3, 4), "Zip code");
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "shell|am|start|-n|pkg/org.kivy.android.PythonActivity|-e|text|'Zip-code'|-e|bounds|'1,2,3,4'|"
        );
    }

    #[test]
    fn hung_launcher_is_abandoned() {
        let mut overlay = AdbOverlay {
            package: "pkg".to_string(),
            launcher: "sleep 5;".to_string(),
            timeout: Duration::from_millis(200),
        };
        let started = Instant::now();
        overlay.show(Rect::ZERO, "Email");
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
