//! Formatted output helpers for CLI commands.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context;
use ghpc_config::Plan;

const RULE_WIDTH: usize = 35;

/// Writes `text` to `out`, or to stdout when no file is given.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn emit(text: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => std::fs::write(path, text).with_context(|| format!("writing {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            Ok(())
        }
    }
}

/// Human-readable rendering of a deployment plan.
#[must_use]
pub fn render_plan(plan: &Plan) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "Deployment Plan for: {} ({})", plan.blueprint, plan.deployment);
    let _ = writeln!(s, "{}", "\u{2550}".repeat(RULE_WIDTH));
    for (i, group) in plan.groups.iter().enumerate() {
        let _ = writeln!(s);
        let _ = writeln!(s, "  {}. {} [{}]", i + 1, group.name, group.kind);
        for id in &group.modules {
            let _ = writeln!(s, "      + {id}");
        }
        for (producer, names) in &group.inputs {
            let _ = writeln!(s, "      <- {producer}: {}", names.join(", "));
        }
    }
    let _ = writeln!(s);
    let _ = writeln!(s, "  {} group(s) will be deployed.", plan.groups.len());
    if !plan.staged_files.is_empty() {
        let _ = writeln!(s);
        let _ = writeln!(s, "  Staged files:");
        for (src, dst) in &plan.staged_files {
            let _ = writeln!(s, "    {src} -> {dst}");
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use ghpc_common::types::{GroupName, ModuleId, ModuleKind};
    use ghpc_config::expand::GroupPlan;

    use super::*;

    fn plan() -> Plan {
        let mut inputs = BTreeMap::new();
        let _ = inputs.insert(GroupName::new("base"), vec!["network_name_net".to_owned()]);
        let mut staged = BTreeMap::new();
        let _ = staged.insert("/bp/boot.sh".to_owned(), "../.ghpc/staged/boot.sh_1".to_owned());
        Plan {
            blueprint: "cluster".to_owned(),
            deployment: "dep".to_owned(),
            groups: vec![
                GroupPlan {
                    name: GroupName::new("base"),
                    kind: ModuleKind::Terraform,
                    modules: vec![ModuleId::new("net")],
                    inputs: BTreeMap::new(),
                },
                GroupPlan {
                    name: GroupName::new("compute"),
                    kind: ModuleKind::Terraform,
                    modules: vec![ModuleId::new("vm")],
                    inputs,
                },
            ],
            staged_files: staged,
        }
    }

    #[test]
    fn render_plan_lists_groups_in_order() {
        let text = render_plan(&plan());
        let base = text.find("1. base [terraform]").expect("base listed");
        let compute = text.find("2. compute [terraform]").expect("compute listed");
        assert!(base < compute, "got: {text}");
        assert!(text.contains("<- base: network_name_net"), "got: {text}");
        assert!(text.contains("2 group(s)"), "got: {text}");
        assert!(text.contains("/bp/boot.sh -> ../.ghpc/staged/boot.sh_1"), "got: {text}");
    }

    #[test]
    fn emit_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.yaml");
        emit("a: 1\n", Some(&path)).expect("should write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "a: 1\n");
    }
}
