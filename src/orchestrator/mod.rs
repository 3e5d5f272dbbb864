//! The launch pipeline.
//!
//! [`Orchestrator`] sequences the four stages of a launch:
//!
//! 1. network probe (advisory; the extended round keeps running in the background)
//! 2. dependency wizard (must end satisfied, or the launch stops as not ready)
//! 3. bundle migration (must commit or no-op)
//! 4. service start (reuse a running service or spawn and wait for readiness)
//!
//! Each stage is also exposed as its own method so it can be driven and
//! tested without the others. Progress goes to the [`EventBus`] and to
//! the UI's status line.

pub mod events;

pub use events::{EventBus, LaunchEvent, LaunchPhase, LaunchState};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::bundle::{
    BundleMigrator, Manifest, MigrationOutcome, MigrationPlan, PackageInstaller,
    ShellPackageInstaller,
};
use crate::config::{merge_env_file, AppConfig, LauncherPaths, LauncherSettings};
use crate::dependencies::{
    install_dependencies, pip_install, DependencyChecker, DependencyKey, DependencyReport,
    DependencyWizard, InstallSummary, Installer, WizardOutcome,
};
use crate::error::Result;
use crate::network::{NetworkProbe, NetworkVerdict};
use crate::runtime::{
    NvmLocator, RuntimeLocator, RuntimeResolver, RuntimeSupervisor, ServiceSpec, ServiceStatus,
};
use crate::shell::{detect_shell, CommandOptions, CommandRunner, Platform, ShellRunner};
use crate::ui::UserInterface;

/// Auto-install steps download toolchains; give each one ten minutes.
const INSTALL_STEP_TIMEOUT_SECS: u64 = 10 * 60;

/// What a launch ended with.
#[derive(Debug)]
pub struct LaunchReport {
    pub state: LaunchState,
    pub verdict: Option<NetworkVerdict>,
    pub dependencies: Option<DependencyReport>,
    pub migration: Option<MigrationOutcome>,
    /// Present once the service is up.
    pub service: Option<ServiceStatus>,
    /// Dependency the user stopped at, when the launch is not ready.
    pub aborted_at: Option<DependencyKey>,
}

impl LaunchReport {
    fn new() -> Self {
        Self {
            state: LaunchState::new(),
            verdict: None,
            dependencies: None,
            migration: None,
            service: None,
            aborted_at: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.phase() == LaunchPhase::Ready
    }
}

/// The orchestrator wired to the real host: shell commands, nvm, and the
/// configured package install command.
pub type HostOrchestrator =
    Orchestrator<ShellRunner, ShellRunner, NvmLocator<ShellRunner>, ShellPackageInstaller>;

/// Runs a launch and exposes each stage as a capability.
///
/// `C` runs dependency checks, `I` runs install steps, `L` finds the
/// runtime executable, `P` installs the service's packages.
pub struct Orchestrator<C, I, L, P> {
    paths: LauncherPaths,
    settings: LauncherSettings,
    platform: Platform,
    checks: C,
    installs: I,
    locator: L,
    packages: P,
    events: EventBus,
}

impl HostOrchestrator {
    pub fn for_host(paths: LauncherPaths, settings: LauncherSettings) -> Self {
        let installs = ShellRunner::with_options(CommandOptions::captured(Some(
            INSTALL_STEP_TIMEOUT_SECS,
        )));
        let locator = NvmLocator::new(
            ShellRunner::with_options(CommandOptions::captured(Some(INSTALL_STEP_TIMEOUT_SECS))),
            &settings.runtime.name,
            &settings.runtime.manager_home(),
        );
        let packages = ShellPackageInstaller::new(settings.runtime.package_install.clone());
        Orchestrator::new(
            paths,
            settings,
            ShellRunner::new(),
            installs,
            locator,
            packages,
        )
    }
}

impl<C, I, L, P> Orchestrator<C, I, L, P>
where
    C: CommandRunner,
    I: CommandRunner,
    L: RuntimeLocator,
    P: PackageInstaller,
{
    pub fn new(
        paths: LauncherPaths,
        settings: LauncherSettings,
        checks: C,
        installs: I,
        locator: L,
        packages: P,
    ) -> Self {
        Self {
            paths,
            settings,
            platform: Platform::current(),
            checks,
            installs,
            locator,
            packages,
            events: EventBus::silent(),
        }
    }

    /// Send launch events to `events`.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn paths(&self) -> &LauncherPaths {
        &self.paths
    }

    pub fn settings(&self) -> &LauncherSettings {
        &self.settings
    }

    /// Runtime version the bundle asks for, else the installed one, else the default.
    pub fn runtime_version(&self) -> String {
        let name = &self.settings.runtime.name;
        let from = |path: &Path| {
            Manifest::load_optional(path)
                .ok()
                .flatten()
                .and_then(|m| m.runtime_version(name).map(str::to_string))
        };
        from(&self.paths.bundle_manifest())
            .or_else(|| from(&self.paths.installed_manifest()))
            .unwrap_or_else(|| self.settings.runtime.default_version.clone())
    }

    /// Migration plan without changing anything.
    pub fn migration_plan(&self) -> Result<MigrationPlan> {
        Ok(self.migrator().plan()?.0)
    }

    fn checker(&self) -> DependencyChecker<impl CommandRunner + '_> {
        let checker = DependencyChecker::new(move |cmd: &str| self.checks.run(cmd), self.platform)
            .with_runtime(&self.settings.runtime, &self.runtime_version());
        match detect_shell().rc_file() {
            Some(rc) if self.platform == Platform::current() => {
                checker.with_rc_file(&rc.display().to_string())
            }
            _ => checker,
        }
    }

    fn installer(&self) -> Installer<impl CommandRunner + '_> {
        Installer::new(move |cmd: &str| self.installs.run(cmd))
    }

    fn migrator(&self) -> BundleMigrator<'_, impl PackageInstaller + '_> {
        BundleMigrator::new(&self.paths, move |dir: &Path| self.packages.install(dir))
            .user_dirs(&self.settings.user_data_dirs)
            .executables(&self.settings.executables)
    }

    /// Fast probe round. The extended round is started in the background and
    /// reports on the event bus. `None` when probing is disabled.
    pub fn probe_network(&self) -> Option<NetworkVerdict> {
        if !self.settings.network.enabled {
            tracing::debug!("network probe disabled");
            return None;
        }
        let probe = match NetworkProbe::new(self.settings.network.clone()) {
            Ok(probe) => probe,
            Err(e) => {
                tracing::warn!("network probe unavailable: {}", e);
                return None;
            }
        };

        let verdict = probe.probe();
        if verdict.likely_restricted {
            self.events
                .emit(LaunchEvent::NetworkRestricted(verdict.clone()));
        }

        if !self.settings.network.extended.is_empty() || !self.settings.network.dns_hosts.is_empty()
        {
            let reports = probe.spawn_extended(verdict.baseline_ok);
            let events = self.events.clone();
            thread::spawn(move || {
                if let Ok(report) = reports.recv() {
                    events.emit(LaunchEvent::ExtendedProbe(report));
                }
            });
        }

        Some(verdict)
    }

    /// One pass over every dependency check.
    pub fn check_dependencies(&self) -> DependencyReport {
        self.checker().check_all()
    }

    /// Install the selected missing dependencies without prompting.
    pub fn install_dependencies(
        &self,
        selection: &[DependencyKey],
        ui: &mut dyn UserInterface,
    ) -> Result<InstallSummary> {
        install_dependencies(&self.checker(), &self.installer(), selection, ui)
    }

    /// Install a Python requirements file into the detected environment.
    pub fn install_python_requirements(
        &self,
        requirements: &Path,
        ui: &mut dyn UserInterface,
    ) -> Result<()> {
        let python = self.checker().python_info();
        let mut spinner = ui.start_spinner(&format!("Installing {}", requirements.display()));
        match pip_install(&self.installs, &python, requirements) {
            Ok(_) => {
                spinner.finish_success("Python requirements installed");
                Ok(())
            }
            Err(e) => {
                spinner.finish_error("Python requirements failed");
                Err(e)
            }
        }
    }

    /// Walk the user through missing dependencies.
    pub fn run_wizard(&self, ui: &mut dyn UserInterface) -> Result<WizardOutcome> {
        let checker = self.checker();
        let installer = self.installer();
        DependencyWizard::new(&checker, &installer).run(ui)
    }

    /// Bring the install dir up to the bundle's build. Each stage is
    /// reported as a status event.
    pub fn migrate_bundle(&self) -> Result<MigrationOutcome> {
        let events = self.events.clone();
        self.migrator()
            .on_stage(move |stage| {
                events.status(stage.status());
                Ok(())
            })
            .migrate()
    }

    /// Merge `config.json` env into the service `.env` and return the port.
    ///
    /// Bundle-relative entries from the settings are resolved against the
    /// bundle dir. `PORT` is always written.
    pub fn prepare_service_env(&self) -> Result<(u16, BTreeMap<String, String>)> {
        let config = AppConfig::load(&self.paths.config_file())?;
        let port = config.port(self.settings.default_port);

        let mut env = config.env.clone();
        for (key, rel) in &self.settings.bundle_env {
            env.insert(
                key.clone(),
                self.paths.bundle_dir.join(rel).display().to_string(),
            );
        }
        env.insert("PORT".to_string(), port.to_string());

        merge_env_file(&self.paths.env_file(), &env)?;
        Ok((port, env))
    }

    fn supervisor(&self, port: u16, env: BTreeMap<String, String>) -> Result<RuntimeSupervisor> {
        RuntimeSupervisor::new(ServiceSpec {
            port,
            install_dir: self.paths.install_dir(),
            entry: self.settings.runtime.entry.clone(),
            readiness_marker: self.settings.readiness_marker.clone(),
            ready_timeout: Duration::from_secs(self.settings.ready_timeout_secs),
            env,
        })
    }

    /// Whether something already answers on the configured port.
    pub fn service_running(&self) -> Result<bool> {
        let config = AppConfig::load(&self.paths.config_file())?;
        let port = config.port(self.settings.default_port);
        Ok(self.supervisor(port, BTreeMap::new())?.is_running())
    }

    /// Reuse a running service or start one and wait for its marker.
    pub fn ensure_service_running(&self) -> Result<ServiceStatus> {
        let (port, env) = self.prepare_service_env()?;
        let supervisor = self.supervisor(port, env)?;
        if supervisor.is_running() {
            tracing::info!("reusing service on port {}", port);
            return Ok(ServiceStatus::AlreadyRunning { port });
        }

        let version = self.runtime_version();
        self.events.status(format!(
            "Preparing {} {}",
            self.settings.runtime.name, version
        ));
        let resolver =
            RuntimeResolver::new(|v: &str| self.locator.locate(v), &self.paths);
        let runtime: PathBuf = resolver.resolve(&version)?;

        self.events.status("Starting service");
        supervisor.start(&runtime).map(ServiceStatus::Started)
    }

    /// Run the whole pipeline.
    ///
    /// A wizard abort ends the launch as [`LaunchPhase::NotReady`] and is
    /// not an error. Fatal errors move the launch to
    /// [`LaunchPhase::Failed`] and are returned.
    pub fn launch(&self, ui: &mut dyn UserInterface) -> Result<LaunchReport> {
        let mut report = LaunchReport::new();
        match self.run_pipeline(ui, &mut report) {
            Ok(()) => Ok(report),
            Err(e) => {
                tracing::error!("launch failed ({:?}): {}", e.class(), e);
                report.state.advance(LaunchPhase::Failed, &self.events);
                Err(e)
            }
        }
    }

    fn run_pipeline(&self, ui: &mut dyn UserInterface, report: &mut LaunchReport) -> Result<()> {
        let events = &self.events;

        self.enter(LaunchPhase::Probing, "Checking network...", report, ui);
        report.verdict = self.probe_network();
        if let Some(verdict) = report.verdict.as_ref().filter(|v| v.likely_restricted) {
            ui.warning(&format!(
                "Network looks restricted ({}). Downloads may fail; check your proxy or VPN.",
                verdict.reason
            ));
        }

        self.enter(LaunchPhase::Dependencies, "Checking environment...", report, ui);
        match self.run_wizard(ui)? {
            WizardOutcome::Satisfied(deps) => report.dependencies = Some(deps),
            WizardOutcome::Aborted { key } => {
                ui.notify(&format!(
                    "Environment not ready: {} is missing. Run again later.",
                    key
                ));
                report.aborted_at = Some(key);
                report.state.advance(LaunchPhase::NotReady, events);
                return Ok(());
            }
        }

        self.enter(LaunchPhase::Migrating, "Updating service files...", report, ui);
        report.migration = Some(self.migrate_bundle()?);

        self.enter(LaunchPhase::StartingService, "Starting service...", report, ui);
        let service = self.ensure_service_running()?;
        ui.success(&format!("Service ready on port {}", service.port()));
        report.service = Some(service);

        report.state.advance(LaunchPhase::Ready, events);
        Ok(())
    }

    fn enter(
        &self,
        phase: LaunchPhase,
        status: &str,
        report: &mut LaunchReport,
        ui: &mut dyn UserInterface,
    ) {
        if report.state.advance(phase, &self.events) {
            ui.set_status(status);
            self.events.status(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::pack;
    use crate::dependencies::checker::tests::FakeHost;
    use crate::error::BasecampError;
    use crate::ui::MockUI;
    use std::cell::Cell;
    use std::fs;
    use std::sync::mpsc::Receiver;
    use tempfile::TempDir;

    const ALL_TOOLS: [&str; 8] = [
        "xcode", "brew", "conda", "coreutils", "timeout", "nvm", "node", "python",
    ];

    fn settings() -> LauncherSettings {
        let mut settings = LauncherSettings::default();
        settings.network.enabled = false;
        settings.ready_timeout_secs = 10;
        settings
    }

    /// Data root plus a packed bundle at build 1 with a seed user dir.
    fn layout(temp: &TempDir) -> LauncherPaths {
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("agents")).unwrap();
        fs::write(src.join("start.js"), "// service").unwrap();
        fs::write(src.join("agents/seed.json"), "{}").unwrap();

        let bundle = temp.path().join("bundle");
        let mut manifest = Manifest::new(0);
        manifest.set_runtime_version("node", "20");
        fs::create_dir_all(&bundle).unwrap();
        manifest.save(&bundle.join("bundle.json")).unwrap();
        pack(&src, &bundle, None).unwrap();

        LauncherPaths::new(temp.path().join("data"), bundle)
    }

    fn orchestrator<'h>(
        host: &'h FakeHost,
        paths: LauncherPaths,
        settings: LauncherSettings,
        locator: impl RuntimeLocator + 'h,
    ) -> Orchestrator<
        impl CommandRunner + 'h,
        impl CommandRunner + 'h,
        impl RuntimeLocator + 'h,
        impl PackageInstaller,
    > {
        Orchestrator::new(
            paths,
            settings,
            move |cmd: &str| host.run(cmd),
            move |cmd: &str| host.run(cmd),
            locator,
            |_: &Path| -> Result<()> { Ok(()) },
        )
        .with_platform(Platform::MacOS)
    }

    fn no_runtime(_: &str) -> Result<PathBuf> {
        panic!("runtime should not be resolved")
    }

    fn phases(rx: &Receiver<LaunchEvent>) -> Vec<LaunchPhase> {
        rx.try_iter()
            .filter_map(|e| match e {
                LaunchEvent::PhaseChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn runtime_version_prefers_bundle_manifest() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost::default();
        let orch = orchestrator(&host, layout(&temp), settings(), no_runtime);
        assert_eq!(orch.runtime_version(), "20");
    }

    #[test]
    fn runtime_version_falls_back_to_default() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost::default();
        let paths = LauncherPaths::new(temp.path(), temp.path().join("missing"));
        let orch = orchestrator(&host, paths, settings(), no_runtime);
        assert_eq!(orch.runtime_version(), "22");
    }

    #[test]
    fn wizard_abort_stops_before_migration() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost::default();
        let paths = layout(&temp);
        let (bus, rx) = EventBus::channel();
        let orch = orchestrator(&host, paths.clone(), settings(), no_runtime).with_events(bus);

        let mut ui = MockUI::new();
        ui.set_prompt_response("dep_xcode_clt", "abort");

        let report = orch.launch(&mut ui).unwrap();

        assert_eq!(report.state.phase(), LaunchPhase::NotReady);
        assert_eq!(report.aborted_at, Some(DependencyKey::XcodeClt));
        assert!(report.migration.is_none());
        assert!(!paths.installed_manifest().exists());
        assert!(ui.has_notification("Run again later"));
        assert_eq!(
            phases(&rx),
            [
                LaunchPhase::Probing,
                LaunchPhase::Dependencies,
                LaunchPhase::NotReady
            ]
        );
    }

    #[test]
    fn migrate_bundle_reports_stages() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost::default();
        let paths = layout(&temp);
        let (bus, rx) = EventBus::channel();
        let orch = orchestrator(&host, paths.clone(), settings(), no_runtime).with_events(bus);

        let outcome = orch.migrate_bundle().unwrap();

        assert!(outcome.performed);
        assert_eq!(outcome.build, 1);
        assert!(paths.install_dir().join("agents/seed.json").exists());
        let statuses: Vec<String> = rx
            .try_iter()
            .filter_map(|e| match e {
                LaunchEvent::Status(s) => Some(s),
                _ => None,
            })
            .collect();
        assert!(statuses.len() >= 8);
        assert_eq!(orch.migration_plan().unwrap(), MigrationPlan::UpToDate { build: 1 });
    }

    #[test]
    fn service_env_merges_config_and_port() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost::default();
        let paths = layout(&temp);
        let mut config = AppConfig::default();
        config.set("PORT", "4100");
        config.set("API_KEY", "k");
        config.save(&paths.config_file()).unwrap();
        fs::create_dir_all(paths.install_dir()).unwrap();
        fs::write(paths.env_file(), "# keep\nAPI_KEY=old\n").unwrap();

        let mut settings = settings();
        settings
            .bundle_env
            .insert("TUNNEL_BIN".to_string(), "frpc/frpc".to_string());
        let orch = orchestrator(&host, paths.clone(), settings, no_runtime);

        let (port, env) = orch.prepare_service_env().unwrap();

        assert_eq!(port, 4100);
        assert_eq!(env["TUNNEL_BIN"], paths.bundle_dir.join("frpc/frpc").display().to_string());
        let content = fs::read_to_string(paths.env_file()).unwrap();
        assert!(content.starts_with("# keep\nAPI_KEY=k\n"));
        assert!(content.contains("PORT=4100"));
    }

    #[test]
    fn install_dependencies_runs_selected_only() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost::with(&["xcode", "brew"]);
        let orch = orchestrator(&host, layout(&temp), settings(), no_runtime);
        let mut ui = MockUI::new();

        let summary = orch
            .install_dependencies(&[DependencyKey::Coreutils], &mut ui)
            .unwrap();

        assert_eq!(summary.installed, [DependencyKey::Coreutils]);
        assert!(host.has("coreutils"));
        assert!(!host.has("nvm"));
    }

    #[test]
    fn python_requirements_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost::with(&["python"]);
        let orch = orchestrator(&host, layout(&temp), settings(), no_runtime);
        let mut ui = MockUI::new();

        let err = orch
            .install_python_requirements(Path::new("requirements.txt"), &mut ui)
            .unwrap_err();

        assert!(matches!(err, BasecampError::CommandFailed { .. }));
        assert!(host.ran("pip3' install -r 'requirements.txt'"));
        assert_eq!(ui.spinners(), ["Installing requirements.txt"]);
    }

    #[test]
    fn check_dependencies_uses_bundle_runtime_version() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost::with(&ALL_TOOLS);
        let orch = orchestrator(&host, layout(&temp), settings(), no_runtime);

        let report = orch.check_dependencies();

        assert!(report.all_satisfied);
        assert!(host.ran("nvm version 20"));
    }

    #[test]
    fn existing_service_is_reused() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.path("/");
            then.status(500);
        });

        let temp = TempDir::new().unwrap();
        let host = FakeHost::default();
        let mut settings = settings();
        settings.default_port = server.port();
        let orch = orchestrator(&host, layout(&temp), settings, no_runtime);

        match orch.ensure_service_running().unwrap() {
            ServiceStatus::AlreadyRunning { port } => assert_eq!(port, server.port()),
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[cfg(unix)]
    fn fake_runtime(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-node");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[cfg(unix)]
    #[test]
    fn full_launch_reaches_ready() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost::with(&ALL_TOOLS);
        let paths = layout(&temp);
        let runtime = fake_runtime(temp.path(), "echo booting\necho \"READY: $PORT\"\nsleep 30");
        let mut settings = settings();
        settings.default_port = free_port();

        let calls = Cell::new(0);
        let locator = |v: &str| -> Result<PathBuf> {
            assert_eq!(v, "20");
            calls.set(calls.get() + 1);
            Ok(runtime.clone())
        };
        let (bus, rx) = EventBus::channel();
        let orch = orchestrator(&host, paths.clone(), settings, locator).with_events(bus);
        let mut ui = MockUI::new();

        let mut report = orch.launch(&mut ui).unwrap();

        assert!(report.is_ready());
        assert_eq!(calls.get(), 1);
        assert_eq!(Manifest::load(&paths.installed_manifest()).unwrap().build, 1);
        assert_eq!(
            phases(&rx),
            [
                LaunchPhase::Probing,
                LaunchPhase::Dependencies,
                LaunchPhase::Migrating,
                LaunchPhase::StartingService,
                LaunchPhase::Ready,
            ]
        );
        match report.service.take() {
            Some(ServiceStatus::Started(mut handle)) => {
                handle.shutdown(Duration::from_secs(5)).unwrap();
            }
            other => panic!("unexpected service: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn service_exit_fails_launch() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost::with(&ALL_TOOLS);
        let runtime = fake_runtime(temp.path(), "echo starting\nexit 1");
        let mut settings = settings();
        settings.default_port = free_port();
        let locator = move |_: &str| -> Result<PathBuf> { Ok(runtime.clone()) };
        let (bus, rx) = EventBus::channel();
        let orch = orchestrator(&host, layout(&temp), settings, locator).with_events(bus);

        let err = orch.launch(&mut MockUI::new()).unwrap_err();

        assert!(matches!(
            err,
            BasecampError::RuntimeNotReady {
                exit_code: Some(1),
                ..
            }
        ));
        assert_eq!(phases(&rx).last(), Some(&LaunchPhase::Failed));
    }
}
