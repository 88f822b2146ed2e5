use serde::{Deserialize, Deserializer};

/// One telemetry payload as served by the producer's system endpoint.
///
/// Every field tolerates absence. The producer writes `null` for empty lists,
/// zero for unknown numbers and `""` for unknown strings; the render layer maps
/// those to its fallbacks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    #[serde(deserialize_with = "null_as_empty")]
    pub processes: Vec<ProcessInfo>,
    pub network: NetworkInfo,
    pub speedtest: SpeedTestInfo,
    pub system: SystemInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CpuInfo {
    pub usage: f64,
    pub model: Option<String>,
    pub cores: u32,
    pub frequency: Option<String>,
    pub cache: Option<String>,
    pub aes: bool,
    pub vmx: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemoryInfo {
    pub percent: f64,
    pub used: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessInfo {
    pub pid: i64,
    pub name: String,
    pub cpu: f64,
    /// Resident memory in bytes. The producer encodes it as a float but only
    /// sends whole page multiples, so rendering rounds to whole bytes.
    pub memory: f64,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkInfo {
    #[serde(deserialize_with = "null_as_empty")]
    pub interfaces: Vec<InterfaceInfo>,
    #[serde(deserialize_with = "null_as_empty")]
    pub tcp: Vec<Connection>,
    #[serde(deserialize_with = "null_as_empty")]
    pub udp: Vec<Connection>,
    pub tcp_count: u64,
    pub udp_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InterfaceInfo {
    pub name: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    /// Link speed in bits per second.
    pub speed: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Connection {
    pub local_addr: String,
    pub remote_addr: String,
    pub status: String,
    pub pid: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpeedTestInfo {
    pub running: bool,
    pub error: Option<String>,
    /// Mbps
    pub download: Option<f64>,
    /// Mbps
    pub upload: Option<f64>,
    /// Milliseconds
    pub ping: Option<f64>,
    pub server: Option<String>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SystemInfo {
    pub os: Option<String>,
    pub kernel: Option<String>,
    pub arch: Option<String>,
    pub uptime: Option<String>,
    pub load_average: Option<String>,
    pub tcp_cc: Option<String>,
    pub virtualization: Option<String>,
    pub organization: Option<String>,
    pub location: Option<String>,
    pub total_disk: Option<String>,
    pub used_disk: Option<String>,
    pub ipv4_status: Option<String>,
    pub ipv6_status: Option<String>,
}

impl SpeedTestInfo {
    /// The error message, if the producer reported a non-empty one.
    pub fn error_message(&self) -> Option<&str> {
        present(&self.error)
    }
}

/// Returns the string when it is set and non-empty.
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Returns the number when it is set and non-zero.
pub fn nonzero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_producer_payload() {
        let body = r#"{
            "cpu": {"model": "AMD EPYC", "cores": 4, "frequency": "2.4 GHz", "cache": "512 KB",
                    "usage": 12.5, "aes": true, "vmx": false},
            "memory": {"total": 2048, "used": 1024, "available": 1024, "percent": 50.0},
            "processes": [{"pid": 1, "name": "init", "cpu": 0.3, "memory": 4096.0, "status": "S"}],
            "network": {
                "interfaces": [{"name": "eth0", "bytes_sent": 10, "bytes_recv": 20, "speed": 1000000000}],
                "tcp": [{"local_addr": "0.0.0.0:22", "remote_addr": "0.0.0.0:0", "status": "LISTEN", "pid": 0}],
                "udp": null,
                "tcp_count": 1,
                "udp_count": 0
            },
            "speedtest": {"running": false, "download": 0, "upload": 0, "ping": 0,
                          "server": "", "last_updated": ""},
            "system": {"os": "Debian 12", "kernel": "6.1", "arch": "x86_64", "region": "EU",
                       "total_disk": "40 GB", "used_disk": "12 GB",
                       "ipv4_status": "Online", "ipv6_status": "Offline"}
        }"#;

        let snapshot: Snapshot = serde_json::from_str(body).expect("valid payload");
        assert_eq!(snapshot.cpu.cores, 4);
        assert!(snapshot.cpu.aes);
        assert_eq!(snapshot.memory.used, 1024);
        assert_eq!(snapshot.processes.len(), 1);
        assert_eq!(snapshot.network.tcp[0].pid, Some(0));
        assert!(snapshot.network.udp.is_empty());
        assert_eq!(snapshot.speedtest.error_message(), None);
        assert_eq!(nonzero(snapshot.speedtest.download), None);
        assert_eq!(present(&snapshot.speedtest.server), None);
        assert_eq!(snapshot.system.os.as_deref(), Some("Debian 12"));
    }

    #[test]
    fn tolerates_missing_sections() {
        let snapshot: Snapshot = serde_json::from_str(r#"{"processes": null}"#).expect("valid");
        assert!(snapshot.processes.is_empty());
        assert_eq!(snapshot.network.tcp_count, 0);
        assert!(snapshot.system.os.is_none());
    }

    #[test]
    fn rejects_non_object_payload() {
        assert!(serde_json::from_str::<Snapshot>("[1, 2]").is_err());
        assert!(serde_json::from_str::<Snapshot>("<html>").is_err());
    }
}
