//! Hot-plug reconciliation

use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::diff::{added_devices, removed_devices, DeviceDiff};
use crate::error::RegistryError;
use crate::registry::{run_locked, DeviceRegistry, RegistryEvent};
use crate::serialize::serialize_device;

impl DeviceRegistry {
    /// Run one reconciliation pass against the current device listing
    ///
    /// Removal is judged after the settle delay so a device that is still
    /// initializing is not dropped and re-added in the same pass.
    pub async fn reconcile_once(&self) -> Result<DeviceDiff, RegistryError> {
        let mut current = self.list_blocking().await?;
        let snapshot = self.state.read().await.snapshot.clone();

        let added = added_devices(&snapshot, &current);
        sleep(self.config().settle_delay).await;
        let removed = removed_devices(&snapshot, &current);

        let mut added_serialized = Vec::new();
        let mut failed = Vec::new();
        for info in &added {
            let entry = match self.open_device(info.clone()).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!(device = %info.bus_info, error = %e, "Failed to open device");
                    failed.push(info.bus_info.clone());
                    continue;
                }
            };
            added_serialized.push(run_locked(entry.device.clone(), serialize_device).await?);
            self.state.write().await.devices.push(entry);
        }

        let mut removed_serialized = Vec::new();
        for info in &removed {
            let entry = {
                let mut state = self.state.write().await;
                let position = state
                    .devices
                    .iter()
                    .position(|entry| entry.bus_info == info.bus_info);
                position.map(|index| state.devices.remove(index))
            };
            let Some(entry) = entry else {
                continue;
            };
            let serialized = run_locked(entry.device, |camera| {
                let serialized = serialize_device(camera);
                camera.device_mut().stop_stream();
                serialized
            })
            .await?;
            info!(device = %info.bus_info, "exploreHD removed");
            removed_serialized.push(serialized);
        }

        if !added_serialized.is_empty() {
            self.emit(RegistryEvent::Added(added_serialized));
        }
        if !removed_serialized.is_empty() {
            self.emit(RegistryEvent::Removed(removed_serialized));
        }

        // Unopened devices count as new again on the next pass
        current.retain(|info| !failed.contains(&info.bus_info));
        self.state.write().await.snapshot = current;
        Ok(DeviceDiff { added, removed })
    }

    /// Reconcile forever, one pass per poll interval
    pub async fn run(&self) {
        let mut ticker = interval(self.config().poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            poll_ms = self.config().poll_interval.as_millis() as u64,
            "Device monitor started"
        );

        loop {
            ticker.tick().await;
            match self.reconcile_once().await {
                Ok(diff) if !diff.is_empty() => debug!(
                    added = diff.added.len(),
                    removed = diff.removed.len(),
                    "Device listing changed"
                ),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Device reconciliation failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::tests::{wait_for_live, StubProbe};
    use crate::registry::{DeviceRegistry, RegistryConfig, RegistryEvent};
    use ehd_core::{FourCC, Interval, StreamEndpoint, StreamType};
    use std::sync::Arc;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::{Duration, Instant};

    fn bus_infos(devices: &[ehd_core::SerializedDevice]) -> Vec<String> {
        devices.iter().map(|d| d.info.usb_info.clone()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_emits_added_and_removed() {
        let probe = Arc::new(StubProbe::with_devices(&["usb-a", "usb-b"]));
        let registry = DeviceRegistry::new(probe.clone(), RegistryConfig::default());
        registry.enumerate().await.unwrap();
        let mut events = registry.subscribe();

        probe.set_devices(&["usb-b", "usb-c"]);
        let diff = registry.reconcile_once().await.unwrap();
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].bus_info, "usb-c");
        assert_eq!(diff.removed[0].bus_info, "usb-a");

        match events.try_recv().unwrap() {
            RegistryEvent::Added(devices) => assert_eq!(bus_infos(&devices), vec!["usb-c"]),
            other => panic!("unexpected event {other:?}"),
        }
        match events.try_recv().unwrap() {
            RegistryEvent::Removed(devices) => assert_eq!(bus_infos(&devices), vec!["usb-a"]),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(registry.bus_infos().await, vec!["usb-b", "usb-c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_listing_emits_nothing() {
        let probe = Arc::new(StubProbe::with_devices(&["usb-a"]));
        let registry = DeviceRegistry::new(probe, RegistryConfig::default());
        registry.enumerate().await.unwrap();
        let mut events = registry.subscribe();

        assert!(registry.reconcile_once().await.unwrap().is_empty());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_devices_stay_in_snapshot() {
        let mut probe = StubProbe::with_devices(&["usb-a"]);
        probe.foreign = vec!["usb-x".to_string()];
        let probe = Arc::new(probe);
        let registry = DeviceRegistry::new(probe.clone(), RegistryConfig::default());
        registry.enumerate().await.unwrap();
        let mut events = registry.subscribe();

        probe.set_devices(&["usb-a", "usb-x"]);
        let diff = registry.reconcile_once().await.unwrap();
        assert_eq!(diff.added.len(), 1);
        // Not an exploreHD, so nothing to announce
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

        // Already in the snapshot, so it is not opened again
        assert!(registry.reconcile_once().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failure_is_retried() {
        let probe = Arc::new(StubProbe::with_devices(&["usb-a"]));
        let registry = DeviceRegistry::new(probe.clone(), RegistryConfig::default());
        registry.enumerate().await.unwrap();
        let mut events = registry.subscribe();

        probe.set_failing(&["usb-b"]);
        probe.set_devices(&["usb-a", "usb-b"]);
        let diff = registry.reconcile_once().await.unwrap();
        assert_eq!(diff.added.len(), 1);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(registry.bus_infos().await, vec!["usb-a"]);

        // Readable on the next pass, so it is picked up then
        probe.set_failing(&[]);
        let diff = registry.reconcile_once().await.unwrap();
        assert_eq!(diff.added[0].bus_info, "usb-b");
        match events.try_recv().unwrap() {
            RegistryEvent::Added(devices) => assert_eq!(bus_infos(&devices), vec!["usb-b"]),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(registry.bus_infos().await, vec!["usb-a", "usb-b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_elapses_each_pass() {
        let probe = Arc::new(StubProbe::with_devices(&["usb-a"]));
        let registry = DeviceRegistry::new(probe, RegistryConfig::default());

        let start = Instant::now();
        registry.reconcile_once().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_device_stream_is_stopped() {
        let probe = Arc::new(StubProbe::with_devices(&["usb-a"]));
        let registry = DeviceRegistry::new(probe.clone(), RegistryConfig::default());
        registry.enumerate().await.unwrap();

        registry
            .with_device("usb-a", |camera| {
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

        let mut events = registry.subscribe();
        probe.set_devices(&[]);
        registry.reconcile_once().await.unwrap();

        match events.try_recv().unwrap() {
            RegistryEvent::Removed(devices) => {
                // Serialized before the stream was stopped
                let json = serde_json::to_value(&devices[0]).unwrap();
                assert_eq!(json["stream"]["encode_type"], "H264");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(probe.launcher.live.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(registry.lookup("usb-a").await.is_none());
    }
}
