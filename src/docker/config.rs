use bollard::container::Config;
use bollard::models::{HostConfig, PortBinding, RestartPolicy as EngineRestartPolicy, RestartPolicyNameEnum};
use std::collections::HashMap;
use std::path::{Component, Path};

use crate::containers::error::{Result, RunError};
use crate::containers::request::{ContainerLaunchRequest, RestartPolicy, VolumeMount};

/// Translate a launch request into an engine container config.
///
/// Relative bind sources (`./data`, `../x`) are resolved against `cwd`;
/// sources without a slash are named volumes. The domain name is not
/// forwarded: the docker backend does not advertise that capability.
pub fn container_config(request: &ContainerLaunchRequest, cwd: &Path) -> Result<Config<String>> {
    let env: Vec<String> = request
        .env
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    let labels: HashMap<String, String> = request
        .labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    for port in &request.ports {
        let key = format!("{}/{}", port.container_port, port.protocol);
        exposed_ports.insert(key.clone(), HashMap::new());
        port_bindings
            .entry(key)
            .or_insert_with(|| Some(Vec::new()))
            .get_or_insert_with(Vec::new)
            .push(PortBinding {
                host_ip: port.host_ip.clone(),
                host_port: port.host_port.map(|p| p.to_string()),
            });
    }

    let mut binds = Vec::new();
    let mut anonymous_volumes: HashMap<String, HashMap<(), ()>> = HashMap::new();
    for mount in &request.volumes {
        match bind_spec(mount, cwd)? {
            Some(bind) => binds.push(bind),
            None => {
                anonymous_volumes.insert(mount.source.clone(), HashMap::new());
            }
        }
    }

    let host_config = HostConfig {
        binds: Some(binds),
        port_bindings: Some(port_bindings),
        nano_cpus: Some((request.cpus * 1e9).round() as i64),
        memory: request.memory.map(|m| m.bytes().min(i64::MAX as u64) as i64),
        restart_policy: Some(restart_policy(request.restart_policy)),
        ..Default::default()
    };

    Ok(Config {
        image: Some(request.image.clone()),
        cmd: (!request.command.is_empty()).then(|| request.command.clone()),
        env: Some(env),
        labels: Some(labels),
        exposed_ports: Some(exposed_ports),
        volumes: (!anonymous_volumes.is_empty()).then_some(anonymous_volumes),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        host_config: Some(host_config),
        ..Default::default()
    })
}

/// `None` for an anonymous volume at an absolute container path.
fn bind_spec(mount: &VolumeMount, cwd: &Path) -> Result<Option<String>> {
    let Some(target) = &mount.target else {
        if mount.source.starts_with('/') {
            return Ok(None);
        }
        return Err(RunError::validation(
            "volume",
            format!("'{}' needs a target path on the docker backend", mount.source),
        ));
    };

    let source = if mount.source.starts_with("./") || mount.source.starts_with("../") || mount.source == "." {
        resolve_relative(cwd, &mount.source)
    } else {
        mount.source.clone()
    };

    let mode = if mount.read_only { ":ro" } else { "" };
    Ok(Some(format!("{}:{}{}", source, target, mode)))
}

/// Join `relative` onto `cwd`, folding `.` and `..` components.
fn resolve_relative(cwd: &Path, relative: &str) -> String {
    let mut path = cwd.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                path.pop();
            }
            other => path.push(other),
        }
    }
    path.to_string_lossy().into_owned()
}

fn restart_policy(policy: RestartPolicy) -> EngineRestartPolicy {
    let name = match policy {
        RestartPolicy::None => RestartPolicyNameEnum::NO,
        RestartPolicy::Always => RestartPolicyNameEnum::ALWAYS,
        RestartPolicy::OnFailure => RestartPolicyNameEnum::ON_FAILURE,
    };
    EngineRestartPolicy {
        name: Some(name),
        maximum_retry_count: None,
    }
}

/// Split `repo[:tag][@digest]` for pulling; a missing tag means `latest`.
pub fn split_image_reference(image: &str) -> (&str, &str) {
    if image.contains('@') {
        return (image, "");
    }
    let last_segment_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[last_segment_start..].rfind(':') {
        Some(i) => {
            let split = last_segment_start + i;
            (&image[..split], &image[split + 1..])
        }
        None => (image, "latest"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::options::RunOptions;

    fn request(opts: RunOptions) -> ContainerLaunchRequest {
        opts.into_launch_request_with("nginx:1.27", |_| None).unwrap()
    }

    #[test]
    fn test_ports_env_and_labels_are_translated() {
        let req = request(RunOptions {
            name: Some("web".into()),
            publish: vec!["8080:80".into(), "127.0.0.1:5353:53/udp".into()],
            environment: vec!["A=1".into()],
            labels: vec!["tier=web".into()],
            ..Default::default()
        });
        let config = container_config(&req, Path::new("/work")).unwrap();

        let exposed = config.exposed_ports.unwrap();
        assert!(exposed.contains_key("80/tcp"));
        assert!(exposed.contains_key("53/udp"));

        let host = config.host_config.unwrap();
        let bindings = host.port_bindings.unwrap();
        let web = bindings["80/tcp"].as_ref().unwrap();
        assert_eq!(web[0].host_port.as_deref(), Some("8080"));
        assert_eq!(web[0].host_ip, None);
        let dns = bindings["53/udp"].as_ref().unwrap();
        assert_eq!(dns[0].host_ip.as_deref(), Some("127.0.0.1"));

        assert_eq!(config.env.unwrap(), vec!["A=1"]);
        assert_eq!(config.labels.unwrap()["tier"], "web");
        assert_eq!(config.cmd, None);
    }

    #[test]
    fn test_resources_and_restart_policy() {
        let req = request(RunOptions {
            cpus: 0.5,
            memory: Some("256m".into()),
            restart: "on-failure".into(),
            command: vec!["nginx".into(), "-g".into(), "daemon off;".into()],
            ..Default::default()
        });
        let config = container_config(&req, Path::new("/work")).unwrap();
        assert_eq!(config.cmd.unwrap(), vec!["nginx", "-g", "daemon off;"]);

        let host = config.host_config.unwrap();
        assert_eq!(host.nano_cpus, Some(500_000_000));
        assert_eq!(host.memory, Some(256 * 1024 * 1024));
        assert_eq!(
            host.restart_policy.unwrap().name,
            Some(RestartPolicyNameEnum::ON_FAILURE)
        );
    }

    #[test]
    fn test_volume_forms() {
        let req = request(RunOptions {
            volumes: vec![
                "./site:/usr/share/nginx/html:ro".into(),
                "cache:/var/cache/nginx".into(),
                "/scratch".into(),
            ],
            ..Default::default()
        });
        let config = container_config(&req, Path::new("/work")).unwrap();

        let binds = config.host_config.unwrap().binds.unwrap();
        assert_eq!(binds, vec!["/work/site:/usr/share/nginx/html:ro", "cache:/var/cache/nginx"]);
        assert!(config.volumes.unwrap().contains_key("/scratch"));
    }

    #[test]
    fn test_parent_relative_bind_is_folded() {
        assert_eq!(resolve_relative(Path::new("/work/app"), "../shared/./conf"), "/work/shared/conf");
    }

    #[test]
    fn test_named_volume_without_target_is_rejected() {
        let req = request(RunOptions {
            volumes: vec!["cache".into()],
            ..Default::default()
        });
        let err = container_config(&req, Path::new("/work")).unwrap_err();
        assert!(matches!(err, RunError::Validation { field: "volume", .. }));
    }

    #[test]
    fn test_domain_name_is_not_forwarded() {
        let req = request(RunOptions {
            domain_name: Some("corp.example".into()),
            ..Default::default()
        });
        let config = container_config(&req, Path::new("/work")).unwrap();
        assert_eq!(config.domainname, None);
    }

    #[test]
    fn test_split_image_reference() {
        assert_eq!(split_image_reference("nginx"), ("nginx", "latest"));
        assert_eq!(split_image_reference("nginx:1.27"), ("nginx", "1.27"));
        assert_eq!(split_image_reference("localhost:5000/app"), ("localhost:5000/app", "latest"));
        assert_eq!(split_image_reference("localhost:5000/app:v2"), ("localhost:5000/app", "v2"));
        assert_eq!(split_image_reference("app@sha256:abc"), ("app@sha256:abc", ""));
    }
}
