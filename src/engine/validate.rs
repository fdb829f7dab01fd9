use std::path::Path;

use crate::config::{looks_like_path, Config, ToolConfig};
use crate::deployment::DeploymentMode;
use crate::engine::ValidationResult;
use crate::util::has_allowed_extension;

/// Pre-flight check of the tool setup and, if given, the input workbook.
///
/// Never called by the runner itself: a bad path there is simply a failed
/// run. This is what `dutyrun check` and `POST /validate` report.
pub fn validate_setup(cfg: &Config, mode: DeploymentMode, input: Option<&Path>) -> ValidationResult {
    let mut result = ValidationResult::ok();

    validate_tool(&cfg.tool, mode, &mut result);
    validate_timeout(&cfg.tool, &mut result);
    if let Some(input) = input {
        validate_input(input, &cfg.picker.extensions, &mut result);
    }

    result
}

/* ---------------- tool ---------------- */

fn validate_tool(tool: &ToolConfig, mode: DeploymentMode, result: &mut ValidationResult) {
    match mode {
        DeploymentMode::Development => {
            let interpreter = tool.interpreter.trim();
            if interpreter.is_empty() {
                result.push_error("TOOL_INTERPRETER_MISSING", "Interpreter is not configured");
            } else if looks_like_path(interpreter) && !Path::new(interpreter).exists() {
                result.push_error(
                    "TOOL_INTERPRETER_NOT_FOUND",
                    format!("Interpreter does not exist: {}", interpreter),
                );
            }

            match &tool.script {
                Some(script) if script.is_file() => {}
                Some(script) => result.push_error(
                    "TOOL_SCRIPT_NOT_FOUND",
                    format!("Tool script does not exist: {}", script.display()),
                ),
                None => result.push_error(
                    "TOOL_SCRIPT_NOT_FOUND",
                    "tool.script is required in development mode",
                ),
            }
        }
        DeploymentMode::Packaged => match &tool.executable {
            Some(exe) if exe.is_file() => {}
            Some(exe) => result.push_error(
                "TOOL_EXECUTABLE_NOT_FOUND",
                format!("Tool executable does not exist: {}", exe.display()),
            ),
            None => result.push_error(
                "TOOL_EXECUTABLE_NOT_FOUND",
                "tool.executable is required in packaged mode",
            ),
        },
    }
}

/* ---------------- timeout ---------------- */

fn validate_timeout(tool: &ToolConfig, result: &mut ValidationResult) {
    if tool.timeout_ms == Some(0) {
        result.push_error("TIMEOUT_INVALID", "timeout_ms must be greater than zero");
    }
}

/* ---------------- input ---------------- */

fn validate_input(input: &Path, extensions: &[String], result: &mut ValidationResult) {
    if !input.exists() {
        result.push_error(
            "INPUT_NOT_FOUND",
            format!("Input file does not exist: {}", input.display()),
        );
        return;
    }

    if !input.is_file() {
        result.push_error(
            "INPUT_NOT_FILE",
            format!("Input is not a file: {}", input.display()),
        );
        return;
    }

    if !has_allowed_extension(input, extensions) {
        result.push_error(
            "INPUT_UNSUPPORTED_TYPE",
            format!(
                "Unsupported input type {:?} (expected one of: {})",
                input.extension().unwrap_or_default(),
                extensions.join(", ")
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> Config {
        let yaml = format!(
            "tool:\n  interpreter: python3\n  script: {}\n  executable: {}\n",
            dir.join("dutyAssign.py").display(),
            dir.join("dutyAssign").display(),
        );
        Config::parse(&yaml).unwrap()
    }

    #[test]
    fn complete_development_setup_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dutyAssign.py"), "print('ok')").unwrap();
        let input = dir.path().join("roster.xlsx");
        std::fs::write(&input, b"PK").unwrap();

        let result = validate_setup(&config(dir.path()), DeploymentMode::Development, Some(&input));
        assert!(result.is_valid(), "{:?}", result.errors);
    }

    #[test]
    fn missing_files_are_reported_per_mode() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());

        let dev = validate_setup(&cfg, DeploymentMode::Development, None);
        assert_eq!(dev.codes(), vec!["TOOL_SCRIPT_NOT_FOUND"]);

        let packaged = validate_setup(&cfg, DeploymentMode::Packaged, None);
        assert_eq!(packaged.codes(), vec!["TOOL_EXECUTABLE_NOT_FOUND"]);
    }

    #[test]
    fn interpreter_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dutyAssign.py"), "").unwrap();
        let mut cfg = config(dir.path());
        cfg.tool.interpreter = dir.path().join(".venv/bin/python").display().to_string();

        let result = validate_setup(&cfg, DeploymentMode::Development, None);
        assert_eq!(result.codes(), vec!["TOOL_INTERPRETER_NOT_FOUND"]);

        cfg.tool.interpreter = "  ".to_string();
        let result = validate_setup(&cfg, DeploymentMode::Development, None);
        assert_eq!(result.codes(), vec!["TOOL_INTERPRETER_MISSING"]);
    }

    #[test]
    fn input_checks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dutyAssign"), "").unwrap();
        let cfg = config(dir.path());

        let missing = validate_setup(&cfg, DeploymentMode::Packaged, Some(&dir.path().join("nope.xlsx")));
        assert_eq!(missing.codes(), vec!["INPUT_NOT_FOUND"]);

        let not_file = validate_setup(&cfg, DeploymentMode::Packaged, Some(dir.path()));
        assert_eq!(not_file.codes(), vec!["INPUT_NOT_FILE"]);

        let csv = dir.path().join("roster.csv");
        std::fs::write(&csv, "a,b").unwrap();
        let wrong_type = validate_setup(&cfg, DeploymentMode::Packaged, Some(&csv));
        assert_eq!(wrong_type.codes(), vec!["INPUT_UNSUPPORTED_TYPE"]);
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dutyAssign"), "").unwrap();
        let mut cfg = config(dir.path());
        cfg.tool.timeout_ms = Some(0);

        let result = validate_setup(&cfg, DeploymentMode::Packaged, None);
        assert_eq!(result.codes(), vec!["TIMEOUT_INVALID"]);
    }
}
