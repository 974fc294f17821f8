use tracerun_model::TaskSpec;

use super::config::ContainerEngineConfig;

/// Label attached to every container started through one connection.
pub const CONNECTION_LABEL: &str = "tracerun.connection";

pub fn label_selector(conn_id: &str) -> String {
    format!("{CONNECTION_LABEL}={conn_id}")
}

pub fn version_args() -> Vec<String> {
    vec!["version".into(), "--format".into(), "{{.Server.Version}}".into()]
}

/// `run --rm --label <label> [--pull p] [-e K=V ...] <image> <argv...>`
pub fn run_args(cfg: &ContainerEngineConfig, conn_id: &str, task: &TaskSpec) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "run".into(),
        "--rm".into(),
        "--label".into(),
        label_selector(conn_id),
    ];
    if let Some(pull) = cfg.pull {
        args.push("--pull".into());
        args.push(pull.as_str().into());
    }
    for kv in task.env.to_assignments() {
        args.push("-e".into());
        args.push(kv);
    }
    args.push(task.base_ref.clone());
    args.extend(task.command.iter().cloned());
    args
}

pub fn list_args(conn_id: &str) -> Vec<String> {
    vec![
        "ps".into(),
        "-aq".into(),
        "--filter".into(),
        format!("label={}", label_selector(conn_id)),
    ]
}

pub fn remove_args<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut args: Vec<String> = vec!["rm".into(), "-f".into()];
    args.extend(ids.into_iter().map(str::to_string));
    args
}
