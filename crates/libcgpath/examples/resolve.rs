use anyhow::Result;
use clap::Parser;
use libcgpath::common::{self, CgroupPathResolver};
use libcgpath::config::CgroupConfig;
use libcgpath::v1::mount::MountRegistry;
use nix::unistd::Pid;
use tracing_subscriber::EnvFilter;

/// Print where the cgroup of a container is located for each controller
#[derive(Parser, Debug)]
struct Opts {
    /// Cgroup path of the container
    #[clap(long, default_value = "")]
    path: String,
    /// Legacy parent of the cgroup, used if no path is given
    #[clap(long, default_value = "")]
    parent: String,
    /// Legacy name of the cgroup, used if no path is given
    #[clap(long, default_value = "")]
    name: String,
    /// Resolve mounts in the mount namespace of this process
    #[clap(long)]
    pid: Option<i32>,
    /// Controllers to resolve, all mounted controllers if empty
    controllers: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    let config = CgroupConfig {
        path: opts.path,
        parent: opts.parent,
        name: opts.name,
    };
    let pid = opts.pid.map(Pid::from_raw).unwrap_or_else(Pid::this);
    let registry = match opts.pid {
        Some(_) => MountRegistry::for_pid(pid),
        None => MountRegistry::new(),
    };

    let resolver = common::create_resolver(common::mode_detector(), &registry);
    let data = match resolver.resolve(&config, pid) {
        Ok(data) => data,
        Err(err) if err.is_not_applicable() => {
            println!("not applicable: {err}");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let mut controllers = opts.controllers;
    if controllers.is_empty() {
        controllers = registry.mount_points()?.keys().cloned().collect();
        controllers.sort();
    }

    for controller in controllers {
        match resolver.subsystem_path(&data, &controller) {
            Ok(path) => println!("{controller}\t{}", path.display()),
            Err(err) => println!("{controller}\terror: {err}"),
        }
    }

    Ok(())
}
