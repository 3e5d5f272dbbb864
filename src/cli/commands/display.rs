//! Shared display helpers.
//!
//! Used by `check`, `deps`, `status` and `probe` so dependency and probe
//! lines look the same everywhere.

use crate::dependencies::DependencyItem;
use crate::network::ProbeResult;
use crate::ui::UserInterface;

/// Icon for a pass/fail line.
pub fn status_icon(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}

/// One dependency line, styled by whether it is installed.
pub fn show_dependency(ui: &mut dyn UserInterface, item: &DependencyItem) {
    let mut line = format!("  {} {}", status_icon(item.installed), item.label);
    if !item.version_info.is_empty() {
        line.push_str(&format!(" ({})", item.version_info));
    }
    if item.installed {
        ui.success(&line);
    } else {
        let path = if item.has_auto_fix() { "auto" } else { "manual" };
        ui.warning(&format!("{} [{} install]", line, path));
    }
}

/// One probe line: name, outcome and timing.
pub fn show_probe(ui: &mut dyn UserInterface, name: &str, result: &ProbeResult) {
    let line = format!(
        "  {} {:<16} {} ({} ms)",
        status_icon(result.ok),
        name,
        result.describe(),
        result.elapsed_ms
    );
    if result.ok {
        ui.message(&line);
    } else {
        ui.warning(&line);
    }
}

/// Aligned `key: value` line.
pub fn show_field(ui: &mut dyn UserInterface, key: &str, value: &str) {
    ui.message(&format!("  {:<18} {}", format!("{}:", key), value));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependencies::DependencyKey;
    use crate::ui::MockUI;

    #[test]
    fn status_icon_values() {
        assert_eq!(status_icon(true), "✓");
        assert_eq!(status_icon(false), "✗");
    }

    #[test]
    fn dependency_lines_use_matching_channel() {
        let mut ui = MockUI::new();
        let mut item = DependencyItem {
            key: DependencyKey::Nvm,
            label: "nvm".to_string(),
            installed: true,
            version_info: "0.39.7".to_string(),
            auto_fix: None,
            manual_fix: None,
            note: String::new(),
        };
        show_dependency(&mut ui, &item);
        assert!(ui.has_success("✓ nvm (0.39.7)"));

        item.installed = false;
        item.version_info.clear();
        item.auto_fix = Some(vec!["curl | bash".to_string()]);
        show_dependency(&mut ui, &item);
        assert!(ui.has_warning("✗ nvm [auto install]"));
    }

    #[test]
    fn failed_probe_is_a_warning() {
        let mut ui = MockUI::new();
        let result = ProbeResult {
            ok: false,
            status_code: Some(503),
            failure: None,
            elapsed_ms: 12,
        };
        show_probe(&mut ui, "github", &result);
        assert!(ui.has_warning("github"));
        assert!(ui.has_warning("503 (12 ms)"));
    }

    #[test]
    fn fields_are_aligned() {
        let mut ui = MockUI::new();
        show_field(&mut ui, "port", "3015");
        assert_eq!(ui.messages()[0], format!("  {:<18} 3015", "port:"));
    }
}
