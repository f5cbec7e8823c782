//! Registry of attached exploreHD devices

use ehd_core::{DeviceInfo, SavedDevice, SerializedDevice, Settings};
use ehd_uvc::ControlledCamera;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::persist;
use crate::probe::DeviceProbe;
use crate::serialize::serialize_device;

/// First port handed out for a host with no endpoints
pub const BASE_PORT: u16 = 5600;

/// A device shared between the registry and its callers
pub type SharedDevice = Arc<Mutex<ControlledCamera>>;

/// Registry timing configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Time between reconciliation passes
    pub poll_interval: Duration,
    /// Wait between computing added and removed devices in one pass
    pub settle_delay: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            settle_delay: Duration::from_millis(50),
        }
    }
}

/// Hot-plug event, carrying the serialized form of each device
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    Added(Vec<SerializedDevice>),
    Removed(Vec<SerializedDevice>),
}

pub(crate) struct DeviceEntry {
    pub(crate) bus_info: String,
    pub(crate) device: SharedDevice,
}

#[derive(Default)]
pub(crate) struct RegistryState {
    pub(crate) devices: Vec<DeviceEntry>,
    /// Everything the last listing returned, exploreHD or not
    pub(crate) snapshot: Vec<DeviceInfo>,
}

/// Owns every attached exploreHD
pub struct DeviceRegistry {
    probe: Arc<dyn DeviceProbe>,
    config: RegistryConfig,
    pub(crate) state: RwLock<RegistryState>,
    settings: RwLock<Option<Settings>>,
    event_tx: broadcast::Sender<RegistryEvent>,
}

impl DeviceRegistry {
    pub fn new(probe: Arc<dyn DeviceProbe>, config: RegistryConfig) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            probe,
            config,
            state: RwLock::new(RegistryState::default()),
            settings: RwLock::new(None),
            event_tx,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Subscribe to hot-plug events
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: RegistryEvent) {
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    /// Replace the device list with a fresh enumeration
    ///
    /// Streams of previously held devices are stopped first. Returns the
    /// number of exploreHD devices now held.
    pub async fn enumerate(&self) -> Result<usize, RegistryError> {
        let previous = std::mem::take(&mut self.state.write().await.devices);
        for entry in previous {
            run_locked(entry.device, |camera| camera.device_mut().stop_stream()).await?;
        }

        let mut listed = self.list_blocking().await?;
        let mut devices = Vec::new();
        let mut failed = Vec::new();
        for info in &listed {
            match self.open_device(info.clone()).await {
                Ok(Some(entry)) => devices.push(entry),
                Ok(None) => {}
                Err(e) => {
                    warn!(device = %info.bus_info, error = %e, "Failed to open device");
                    failed.push(info.bus_info.clone());
                }
            }
        }
        // Left out of the snapshot so the monitor retries them
        listed.retain(|info| !failed.contains(&info.bus_info));

        let count = devices.len();
        let mut state = self.state.write().await;
        state.devices = devices;
        state.snapshot = listed;
        info!(devices = count, "Enumerated exploreHD devices");
        Ok(count)
    }

    /// Find a device by USB bus identity
    pub async fn lookup(&self, bus_info: &str) -> Option<SharedDevice> {
        self.state
            .read()
            .await
            .devices
            .iter()
            .find(|entry| entry.bus_info == bus_info)
            .map(|entry| entry.device.clone())
    }

    /// Find a device by its sysfs path or one of its video nodes
    pub async fn lookup_by_path(&self, path: &str) -> Option<SharedDevice> {
        for device in self.devices().await {
            if device.lock().await.device().matches_path(path) {
                return Some(device);
            }
        }
        None
    }

    pub async fn devices(&self) -> Vec<SharedDevice> {
        self.state
            .read()
            .await
            .devices
            .iter()
            .map(|entry| entry.device.clone())
            .collect()
    }

    pub async fn bus_infos(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .devices
            .iter()
            .map(|entry| entry.bus_info.clone())
            .collect()
    }

    /// Run `f` against one device under its lock on the blocking pool
    pub async fn with_device<F, T>(&self, bus_info: &str, f: F) -> Result<T, RegistryError>
    where
        F: FnOnce(&mut ControlledCamera) -> T + Send + 'static,
        T: Send + 'static,
    {
        let device = self
            .lookup(bus_info)
            .await
            .ok_or_else(|| RegistryError::DeviceNotFound(bus_info.to_string()))?;
        run_locked(device, f).await
    }

    pub async fn serialize(&self, bus_info: &str) -> Result<SerializedDevice, RegistryError> {
        self.with_device(bus_info, serialize_device).await
    }

    pub async fn serialize_all(&self) -> Result<Vec<SerializedDevice>, RegistryError> {
        let mut serialized = Vec::new();
        for device in self.devices().await {
            serialized.push(run_locked(device, serialize_device).await?);
        }
        Ok(serialized)
    }

    /// Stop a device's stream and drop its configuration
    pub async fn unconfigure_stream(&self, bus_info: &str) -> Result<(), RegistryError> {
        self.with_device(bus_info, |camera| camera.device_mut().unconfigure_stream())
            .await?;
        info!(device = %bus_info, "Stream unconfigured");
        Ok(())
    }

    /// Port to suggest for a new endpoint on `host`
    ///
    /// One past the highest port any held device streams to on that host,
    /// or `BASE_PORT` when none does.
    pub async fn next_port(&self, host: &str) -> u16 {
        let mut highest = None;
        for device in self.devices().await {
            let camera = device.lock().await;
            let ports = camera
                .device()
                .pipeline()
                .info()
                .endpoints
                .iter()
                .filter(|endpoint| endpoint.host == host)
                .map(|endpoint| endpoint.port);
            highest = highest.max(ports.max());
        }
        highest.map_or(BASE_PORT, |port| port.saturating_add(1))
    }

    /// Use `settings` to restore devices opened from now on
    pub async fn attach_settings(&self, settings: Settings) {
        debug!(records = settings.devices.device.len(), "Attached device settings");
        *self.settings.write().await = Some(settings);
    }

    pub async fn settings(&self) -> Option<Settings> {
        self.settings.read().await.clone()
    }

    /// Apply the attached settings to every held device
    pub async fn restore_all(&self) -> Result<usize, RegistryError> {
        let mut restored = 0;
        for device in self.devices().await {
            let bus_info = device.lock().await.bus_info().to_string();
            if let Some(record) = self.saved_record(&bus_info).await {
                run_locked(device, move |camera| persist::restore(camera, &record)).await?;
                restored += 1;
            }
        }
        Ok(restored)
    }

    /// Capture a settings record for every held device
    pub async fn snapshot_settings(&self) -> Result<Vec<SavedDevice>, RegistryError> {
        let mut records = Vec::new();
        for device in self.devices().await {
            records.push(run_locked(device, persist::snapshot).await?);
        }
        Ok(records)
    }

    /// Merge every held device into the settings document and write it
    pub async fn save_settings(&self, path: &Path) -> Result<(), RegistryError> {
        let records = self.snapshot_settings().await?;
        let count = records.len();

        let mut settings = self.settings.write().await;
        let settings = settings.get_or_insert_with(Settings::new);
        for record in records {
            settings.upsert(record);
        }
        settings.save(path)?;
        info!(path = %path.display(), devices = count, "Saved device settings");
        Ok(())
    }

    /// Save only when some held device differs from its stored record
    ///
    /// Returns whether the file was written.
    pub async fn sync_settings(&self, path: &Path) -> Result<bool, RegistryError> {
        let records = self.snapshot_settings().await?;
        let current = match self.settings.read().await.as_ref() {
            Some(settings) => records.iter().all(|record| settings.is_current(record)),
            None => records.is_empty(),
        };
        if current {
            return Ok(false);
        }
        self.save_settings(path).await?;
        Ok(true)
    }

    /// Sync settings to `path` forever, one pass per `period`
    pub async fn run_settings_sync(&self, path: &Path, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(path = %path.display(), period_ms = period.as_millis() as u64, "Settings sync started");

        loop {
            ticker.tick().await;
            if let Err(e) = self.sync_settings(path).await {
                warn!(path = %path.display(), error = %e, "Settings sync failed");
            }
        }
    }

    /// Stop every running stream
    pub async fn stop_all(&self) -> Result<(), RegistryError> {
        for device in self.devices().await {
            run_locked(device, |camera| camera.device_mut().stop_stream()).await?;
        }
        Ok(())
    }

    pub(crate) async fn list_blocking(&self) -> Result<Vec<DeviceInfo>, RegistryError> {
        let probe = self.probe.clone();
        Ok(tokio::task::spawn_blocking(move || probe.list()).await??)
    }

    async fn saved_record(&self, bus_info: &str) -> Option<SavedDevice> {
        self.settings
            .read()
            .await
            .as_ref()
            .and_then(|settings| settings.find(bus_info))
            .cloned()
    }

    /// Open, filter and restore one listed device
    ///
    /// `Ok(None)` when the device is not an exploreHD.
    pub(crate) async fn open_device(
        &self,
        info: DeviceInfo,
    ) -> Result<Option<DeviceEntry>, RegistryError> {
        let probe = self.probe.clone();
        let record = self.saved_record(&info.bus_info).await;
        let bus_info = info.bus_info.clone();

        let opened = tokio::task::spawn_blocking(move || {
            probe.open(&info).map(|camera| {
                camera.map(|mut camera| {
                    if let Some(record) = &record {
                        persist::restore(&mut camera, record);
                    }
                    camera
                })
            })
        })
        .await??;

        Ok(opened.map(|camera| {
            info!(device = %bus_info, nickname = %camera.nickname(), "Opened exploreHD");
            DeviceEntry {
                bus_info,
                device: Arc::new(Mutex::new(camera)),
            }
        }))
    }
}

/// Lock `device` and run `f` on the blocking pool while the lock is held
pub(crate) async fn run_locked<F, T>(device: SharedDevice, f: F) -> Result<T, RegistryError>
where
    F: FnOnce(&mut ControlledCamera) -> T + Send + 'static,
    T: Send + 'static,
{
    let mut guard = device.lock_owned().await;
    Ok(tokio::task::spawn_blocking(move || f(&mut guard)).await?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ehd_core::{DeviceOptions, FourCC, Format, FormatSize, H264Mode, Interval, StreamEndpoint, StreamType};
    use ehd_stream::{PipelineExit, PipelineLauncher, RunningPipeline, StreamPipeline};
    use ehd_uvc::{Camera, CaptureDevice, UvcError};
    use std::io;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Launcher whose runs stay alive until killed
    #[derive(Default)]
    pub(crate) struct FakeLauncher {
        pub live: Arc<AtomicUsize>,
    }

    struct FakeRun {
        live: Arc<AtomicUsize>,
        alive: bool,
    }

    impl RunningPipeline for FakeRun {
        fn try_wait(&mut self) -> io::Result<Option<PipelineExit>> {
            Ok(None)
        }

        fn kill(&mut self) -> io::Result<()> {
            if self.alive {
                self.alive = false;
                self.live.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    impl PipelineLauncher for FakeLauncher {
        fn launch(&self, _description: &str) -> io::Result<Box<dyn RunningPipeline>> {
            self.live.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeRun {
                live: self.live.clone(),
                alive: true,
            }))
        }
    }

    fn format(pixel_format: FourCC) -> Format {
        Format {
            pixel_format,
            sizes: vec![FormatSize {
                width: 1920,
                height: 1080,
                intervals: vec![Interval::new(1, 30)],
            }],
        }
    }

    pub(crate) fn device_info(bus_info: &str) -> DeviceInfo {
        let mut info = DeviceInfo::new("exploreHD USB Camera", bus_info);
        info.video_node_paths = vec![
            format!("/dev/{}-video0", bus_info),
            format!("/dev/{}-video2", bus_info),
        ];
        info
    }

    /// A hardware-free exploreHD with an H.264 and an MJPG node
    pub(crate) fn ehd_camera(bus_info: &str, launcher: Arc<FakeLauncher>) -> ControlledCamera {
        let info = device_info(bus_info);
        let cameras = vec![
            Camera::detached(info.video_node_paths[0].clone(), vec![format(FourCC::H264)]),
            Camera::detached(info.video_node_paths[1].clone(), vec![format(FourCC::MJPG)]),
        ];
        let pipeline = StreamPipeline::new(launcher).with_poll_interval(Duration::from_millis(5));
        let device = CaptureDevice::from_parts(
            info,
            cameras,
            PathBuf::from(format!("/sys/devices/test/{}", bus_info)),
            pipeline,
        );
        let options = DeviceOptions {
            bitrate: 2_000_000,
            gop: 29,
            mode: H264Mode::VariableBitrate,
        };
        match ControlledCamera::from_parts(device, options) {
            Ok(camera) => camera,
            Err(e) => panic!("fixture camera: {e}"),
        }
    }

    /// Probe over an editable device list; `foreign` devices are listed
    /// but are not exploreHDs
    #[derive(Default)]
    pub(crate) struct StubProbe {
        pub listed: std::sync::Mutex<Vec<DeviceInfo>>,
        pub foreign: Vec<String>,
        pub launcher: Arc<FakeLauncher>,
        pub opened: AtomicUsize,
        /// Listed devices whose attributes cannot be read
        pub failing: std::sync::Mutex<Vec<String>>,
    }

    impl StubProbe {
        pub(crate) fn with_devices(bus_infos: &[&str]) -> Self {
            let probe = Self::default();
            probe.set_devices(bus_infos);
            probe
        }

        pub(crate) fn set_devices(&self, bus_infos: &[&str]) {
            *self.listed.lock().unwrap() = bus_infos.iter().map(|b| device_info(b)).collect();
        }

        pub(crate) fn set_failing(&self, bus_infos: &[&str]) {
            *self.failing.lock().unwrap() = bus_infos.iter().map(|b| b.to_string()).collect();
        }
    }

    impl DeviceProbe for StubProbe {
        fn list(&self) -> Result<Vec<DeviceInfo>, UvcError> {
            Ok(self.listed.lock().unwrap().clone())
        }

        fn open(&self, info: &DeviceInfo) -> Result<Option<ControlledCamera>, UvcError> {
            if self.failing.lock().unwrap().contains(&info.bus_info) {
                return Err(UvcError::AttributeNotFound("idVendor".to_string()));
            }
            if self.foreign.contains(&info.bus_info) {
                return Ok(None);
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Some(ehd_camera(&info.bus_info, self.launcher.clone())))
        }
    }

    /// Runs launch on their own thread; wait until `count` are alive
    pub(crate) fn wait_for_live(launcher: &FakeLauncher, count: usize) {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while launcher.live.load(Ordering::SeqCst) != count && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(launcher.live.load(Ordering::SeqCst), count);
    }

    fn registry(probe: StubProbe) -> (DeviceRegistry, Arc<StubProbe>) {
        let probe = Arc::new(probe);
        let registry = DeviceRegistry::new(probe.clone(), RegistryConfig::default());
        (registry, probe)
    }

    #[tokio::test]
    async fn test_enumerate_filters_foreign_devices() {
        let mut probe = StubProbe::with_devices(&["usb-1", "usb-2", "usb-3"]);
        probe.foreign = vec!["usb-2".to_string()];
        let (registry, _probe) = registry(probe);

        assert_eq!(registry.enumerate().await.unwrap(), 2);
        assert_eq!(registry.bus_infos().await, vec!["usb-1", "usb-3"]);
        // The snapshot keeps everything that was listed
        assert_eq!(registry.state.read().await.snapshot.len(), 3);
    }

    #[tokio::test]
    async fn test_lookup_by_bus_info_and_path() {
        let (registry, _probe) = registry(StubProbe::with_devices(&["usb-1", "usb-2"]));
        registry.enumerate().await.unwrap();

        assert!(registry.lookup("usb-2").await.is_some());
        assert!(registry.lookup("usb-9").await.is_none());

        let device = registry.lookup_by_path("/dev/usb-2-video2").await.unwrap();
        assert_eq!(device.lock().await.bus_info(), "usb-2");
        let device = registry.lookup_by_path("/sys/devices/test/usb-1").await.unwrap();
        assert_eq!(device.lock().await.bus_info(), "usb-1");
        assert!(registry.lookup_by_path("/dev/video99").await.is_none());
    }

    #[tokio::test]
    async fn test_with_device_runs_under_lock() {
        let (registry, _probe) = registry(StubProbe::with_devices(&["usb-1"]));
        registry.enumerate().await.unwrap();

        registry
            .with_device("usb-1", |camera| camera.set_nickname("front"))
            .await
            .unwrap();
        let nickname = registry
            .with_device("usb-1", |camera| camera.nickname().to_string())
            .await
            .unwrap();
        assert_eq!(nickname, "front");

        let missing = registry.with_device("usb-9", |_| ()).await;
        assert!(matches!(missing, Err(RegistryError::DeviceNotFound(_))));
    }

    #[tokio::test]
    async fn test_serialize_unconfigured_stream_is_empty_object() {
        let (registry, _probe) = registry(StubProbe::with_devices(&["usb-1"]));
        registry.enumerate().await.unwrap();

        let serialized = registry.serialize("usb-1").await.unwrap();
        let json = serde_json::to_value(&serialized).unwrap();
        assert_eq!(json["stream"], serde_json::json!({}));
        assert_eq!(json["info"]["usb_info"], "usb-1");
        assert_eq!(json["options"]["mode"], "VBR");
        assert_eq!(json["cameras"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_enumerate_restores_from_attached_settings() {
        let (registry, probe) = registry(StubProbe::with_devices(&["usb-1"]));
        registry.enumerate().await.unwrap();

        registry
            .with_device("usb-1", |camera| {
                camera.set_nickname("front");
                camera.device_mut().configure_stream(
                    FourCC::H264,
                    1920,
                    1080,
                    Interval::new(1, 30),
                    StreamType::Udp,
                    vec![StreamEndpoint::new("127.0.0.1", 5600)],
                )
            })
            .await
            .unwrap()
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device_settings.xml");
        registry.save_settings(&path).await.unwrap();

        let settings = Settings::load_or_create(&path).unwrap();
        assert_eq!(settings.find("usb-1").unwrap().nickname, "front");

        // A fresh registry picks the record up on enumeration
        let fresh = DeviceRegistry::new(probe.clone(), RegistryConfig::default());
        fresh.attach_settings(settings).await;
        fresh.enumerate().await.unwrap();

        let (nickname, configured) = fresh
            .with_device("usb-1", |camera| {
                (
                    camera.nickname().to_string(),
                    camera.device().pipeline().is_configured(),
                )
            })
            .await
            .unwrap();
        assert_eq!(nickname, "front");
        assert!(configured);

        fresh.stop_all().await.unwrap();
        registry.stop_all().await.unwrap();
        assert_eq!(probe.launcher.live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reenumerate_stops_previous_streams() {
        let (registry, probe) = registry(StubProbe::with_devices(&["usb-1"]));
        registry.enumerate().await.unwrap();

        registry
            .with_device("usb-1", |camera| {
                let device = camera.device_mut();
                device.configure_stream(
                    FourCC::H264,
                    1920,
                    1080,
                    Interval::new(1, 30),
                    StreamType::Udp,
                    vec![StreamEndpoint::new("127.0.0.1", 5600)],
                )?;
                device.start_stream()
            })
            .await
            .unwrap()
            .unwrap();
        wait_for_live(&probe.launcher, 1);

        registry.enumerate().await.unwrap();
        assert_eq!(probe.launcher.live.load(Ordering::SeqCst), 0);
        assert_eq!(probe.opened.load(Ordering::SeqCst), 2);
    }

    fn configure(camera: &mut ControlledCamera, endpoints: Vec<StreamEndpoint>) -> Result<(), UvcError> {
        camera.device_mut().configure_stream(
            FourCC::H264,
            1920,
            1080,
            Interval::new(1, 30),
            StreamType::Udp,
            endpoints,
        )
    }

    #[tokio::test]
    async fn test_enumerate_skips_unreadable_devices() {
        let probe = StubProbe::with_devices(&["usb-1", "usb-2"]);
        probe.set_failing(&["usb-2"]);
        let (registry, _probe) = registry(probe);

        assert_eq!(registry.enumerate().await.unwrap(), 1);
        assert_eq!(registry.bus_infos().await, vec!["usb-1"]);
        let snapshot = registry.state.read().await.snapshot.clone();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].bus_info, "usb-1");
    }

    #[tokio::test]
    async fn test_unconfigure_stream_stops_and_clears() {
        let (registry, probe) = registry(StubProbe::with_devices(&["usb-1"]));
        registry.enumerate().await.unwrap();

        registry
            .with_device("usb-1", |camera| {
                configure(camera, vec![StreamEndpoint::new("127.0.0.1", 5600)])?;
                camera.device_mut().start_stream()
            })
            .await
            .unwrap()
            .unwrap();
        wait_for_live(&probe.launcher, 1);

        registry.unconfigure_stream("usb-1").await.unwrap();
        assert_eq!(probe.launcher.live.load(Ordering::SeqCst), 0);

        let json = serde_json::to_value(registry.serialize("usb-1").await.unwrap()).unwrap();
        assert_eq!(json["stream"], serde_json::json!({}));

        let missing = registry.unconfigure_stream("usb-9").await;
        assert!(matches!(missing, Err(RegistryError::DeviceNotFound(_))));
    }

    #[tokio::test]
    async fn test_next_port_without_endpoints_is_base() {
        let (registry, _probe) = registry(StubProbe::with_devices(&["usb-1"]));
        assert_eq!(registry.next_port("127.0.0.1").await, BASE_PORT);

        registry.enumerate().await.unwrap();
        assert_eq!(registry.next_port("127.0.0.1").await, 5600);
    }

    #[tokio::test]
    async fn test_next_port_follows_highest_for_host() {
        let (registry, _probe) = registry(StubProbe::with_devices(&["usb-1", "usb-2"]));
        registry.enumerate().await.unwrap();

        registry
            .with_device("usb-1", |camera| {
                configure(
                    camera,
                    vec![
                        StreamEndpoint::new("127.0.0.1", 5600),
                        StreamEndpoint::new("192.168.2.1", 5610),
                    ],
                )
            })
            .await
            .unwrap()
            .unwrap();
        registry
            .with_device("usb-2", |camera| {
                configure(camera, vec![StreamEndpoint::new("127.0.0.1", 5603)])
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(registry.next_port("127.0.0.1").await, 5604);
        assert_eq!(registry.next_port("192.168.2.1").await, 5611);
        assert_eq!(registry.next_port("10.0.0.1").await, 5600);
    }

    #[tokio::test]
    async fn test_sync_settings_writes_only_changes() {
        let (registry, _probe) = registry(StubProbe::with_devices(&["usb-1"]));
        registry.enumerate().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device_settings.xml");

        assert!(registry.sync_settings(&path).await.unwrap());
        assert!(!registry.sync_settings(&path).await.unwrap());

        registry
            .with_device("usb-1", |camera| camera.set_nickname("rear"))
            .await
            .unwrap();
        assert!(registry.sync_settings(&path).await.unwrap());
        let saved = Settings::load_or_create(&path).unwrap();
        assert_eq!(saved.find("usb-1").unwrap().nickname, "rear");
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_sync_runs_every_period() {
        let (registry, _probe) = registry(StubProbe::with_devices(&["usb-1"]));
        registry.enumerate().await.unwrap();
        let registry = Arc::new(registry);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device_settings.xml");

        let sync = tokio::spawn({
            let registry = registry.clone();
            let path = path.clone();
            async move {
                registry
                    .run_settings_sync(&path, Duration::from_secs(1))
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(Settings::load_or_create(&path).unwrap().find("usb-1").is_some());

        registry
            .with_device("usb-1", |camera| camera.set_nickname("port"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let saved = Settings::load_or_create(&path).unwrap();
        assert_eq!(saved.find("usb-1").unwrap().nickname, "port");

        sync.abort();
    }
}
