//! DSM system overview: hardware, storage, network and load.
//!
//! DSM is loose with number types across models and firmware versions
//! (`"4"` vs `4`), so numeric fields accept either form. Records serialize
//! with plain numbers and snake_case names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, de};

fn flexible<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Number(T),
        Text(String),
    }

    match Raw::<T>::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

/// Model, firmware and CPU details (`SYNO.Core.System info`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreInfo {
    pub model: String,
    pub firmware_ver: String,
    #[serde(default)]
    pub firmware_date: String,
    pub cpu_vendor: String,
    pub cpu_family: String,
    pub cpu_series: String,
    #[serde(deserialize_with = "flexible")]
    pub cpu_cores: u32,
    /// MHz.
    #[serde(deserialize_with = "flexible")]
    pub cpu_clock_speed: u32,
    /// MB.
    #[serde(deserialize_with = "flexible")]
    pub ram_size: u64,
    /// °C.
    #[serde(deserialize_with = "flexible")]
    pub sys_temp: i64,
    #[serde(default)]
    pub temperature_warning: bool,
    /// `hh:mm:ss` as reported by DSM.
    pub up_time: String,
    #[serde(default)]
    pub ntp_server: String,
}

/// One physical disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub diskno: String,
    #[serde(alias = "diskPath")]
    pub disk_path: String,
    #[serde(alias = "diskType")]
    pub disk_type: String,
    /// Bytes.
    #[serde(deserialize_with = "flexible")]
    pub capacity: u64,
    /// °C.
    #[serde(deserialize_with = "flexible")]
    pub temp: i64,
    pub status: String,
    #[serde(default)]
    pub overview_status: String,
}

/// One storage volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub status: String,
    /// Bytes.
    #[serde(deserialize_with = "flexible")]
    pub total_size: u64,
    /// Bytes.
    #[serde(deserialize_with = "flexible")]
    pub used_size: u64,
    #[serde(default)]
    pub is_encrypted: bool,
}

/// Disks and volumes (`SYNO.Core.System info type=storage`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageInfo {
    #[serde(alias = "hdd_info")]
    pub disks: Vec<Disk>,
    #[serde(alias = "vol_info")]
    pub volumes: Vec<Volume>,
}

/// One network interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub id: String,
    #[serde(default)]
    pub addr: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    /// Mbit/s; negative when the link is down.
    #[serde(default, deserialize_with = "flexible")]
    pub speed: i64,
    #[serde(default)]
    pub use_dhcp: bool,
}

/// Host naming and interfaces (`SYNO.Core.System info type=network`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub hostname: String,
    #[serde(default)]
    pub dns: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub workgroup: String,
    #[serde(alias = "nif")]
    pub interfaces: Vec<NetworkInterface>,
}

/// Load averages, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuLoad {
    #[serde(alias = "1min_load", deserialize_with = "flexible")]
    pub load_1_min_avg: u32,
    #[serde(alias = "5min_load", deserialize_with = "flexible")]
    pub load_5_min_avg: u32,
    #[serde(alias = "15min_load", deserialize_with = "flexible")]
    pub load_15_min_avg: u32,
}

/// Memory usage, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    #[serde(deserialize_with = "flexible")]
    pub real_usage: u32,
}

/// Current load (`SYNO.Core.System.Utilization get`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utilization {
    pub cpu: CpuLoad,
    pub memory: MemoryUsage,
}

/// Everything `/nas/system` reports, gathered in one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub core: CoreInfo,
    pub storage: StorageInfo,
    pub network: NetworkInfo,
    pub utilization: Utilization,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_core_info_accepts_string_numbers() {
        let core: CoreInfo = serde_json::from_value(json!({
            "model": "DS920+",
            "firmware_ver": "DSM 7.2.1-69057 Update 5",
            "firmware_date": "2024/04/23",
            "cpu_vendor": "INTEL",
            "cpu_family": "Celeron",
            "cpu_series": "J4125",
            "cpu_cores": "4",
            "cpu_clock_speed": 2000,
            "ram_size": 8192,
            "sys_temp": 41,
            "temperature_warning": false,
            "up_time": "312:10:05",
            "ntp_server": "time.google.com"
        }))
        .unwrap();

        assert_eq!(core.cpu_cores, 4);
        assert_eq!(core.ram_size, 8192);
    }

    #[test]
    fn test_storage_wire_names() {
        let storage: StorageInfo = serde_json::from_value(json!({
            "hdd_info": [{
                "diskno": "Disk 1",
                "diskPath": "/dev/sata1",
                "diskType": "SATA",
                "capacity": "4000787030016",
                "temp": 35,
                "status": "normal",
                "overview_status": "normal"
            }],
            "vol_info": [{
                "name": "volume_1",
                "desc": "",
                "status": "normal",
                "total_size": "3838499168256",
                "used_size": "1200000000000",
                "is_encrypted": false
            }]
        }))
        .unwrap();

        assert_eq!(storage.disks[0].disk_path, "/dev/sata1");
        assert_eq!(storage.disks[0].capacity, 4_000_787_030_016);
        assert_eq!(storage.volumes[0].used_size, 1_200_000_000_000);

        // Cached form uses our names and must read back.
        let cached = serde_json::to_value(&storage).unwrap();
        assert!(cached.get("disks").is_some());
        let again: StorageInfo = serde_json::from_value(cached).unwrap();
        assert_eq!(again, storage);
    }

    #[test]
    fn test_utilization_load_aliases() {
        let utilization: Utilization = serde_json::from_value(json!({
            "cpu": {"1min_load": 12, "5min_load": 9, "15min_load": 7, "user_load": 3},
            "memory": {"real_usage": 38, "total_real": 8_000_000}
        }))
        .unwrap();

        assert_eq!(utilization.cpu.load_1_min_avg, 12);
        assert_eq!(utilization.cpu.load_15_min_avg, 7);
        assert_eq!(utilization.memory.real_usage, 38);
    }

    #[test]
    fn test_non_numeric_string_rejected() {
        let result: Result<MemoryUsage, _> =
            serde_json::from_value(json!({"real_usage": "lots"}));
        assert!(result.is_err());
    }
}
