//! Projection of a snapshot onto display regions, one function per section.
//!
//! Every projector overwrites its regions completely, so rendering the same
//! snapshot twice leaves the surface exactly as after the first pass.

pub mod network;
pub mod system;

use crate::format::{format_bytes, format_percent};
use crate::snapshot::{CpuInfo, MemoryInfo, ProcessInfo, Snapshot};
use crate::speedtest::{self, SharedPhase};
use crate::surface::DisplaySurface;

/// Stable identifiers of the display regions.
pub mod region {
    pub const CPU_USAGE: &str = "cpu-usage";

    pub const MEM_PERCENT: &str = "mem-percent";
    pub const MEM_USED: &str = "mem-used";
    pub const MEM_TOTAL: &str = "mem-total";

    pub const PROCESSES_TABLE: &str = "processes-table";

    pub const INTERFACES_TABLE: &str = "interfaces-table";
    pub const TCP_TABLE: &str = "tcp-table";
    pub const UDP_TABLE: &str = "udp-table";
    pub const TCP_COUNT: &str = "tcp-count";
    pub const UDP_COUNT: &str = "udp-count";

    pub const DOWNLOAD_SPEED: &str = "download-speed";
    pub const UPLOAD_SPEED: &str = "upload-speed";
    pub const PING_TIME: &str = "ping-time";
    pub const SERVER_INFO: &str = "server-info";
    pub const LAST_UPDATED: &str = "last-updated";
    pub const SPEEDTEST_TRIGGER: &str = "speedtest-btn";

    pub const CPU_MODEL: &str = "cpu-model";
    pub const CPU_CORES_DETAILED: &str = "cpu-cores-detailed";
    pub const CPU_CACHE: &str = "cpu-cache";
    pub const CPU_AES: &str = "cpu-aes";
    pub const CPU_VMX: &str = "cpu-vmx";
    pub const TOTAL_DISK: &str = "total-disk";
    pub const OS_INFO: &str = "os-info";
    pub const KERNEL_INFO: &str = "kernel-info";
    pub const ARCH_INFO: &str = "arch-info";
    pub const UPTIME_INFO: &str = "uptime-info";
    pub const LOAD_AVG: &str = "load-avg";
    pub const TCP_CC: &str = "tcp-cc";
    pub const VIRT_INFO: &str = "virt-info";
    pub const IP_STATUS: &str = "ip-status";
    pub const ORGANIZATION: &str = "organization";
    pub const LOCATION: &str = "location";
}

/// Applies every section of `snapshot` in page order.
pub fn render_snapshot(surface: &dyn DisplaySurface, phase: &SharedPhase, snapshot: &Snapshot) {
    render_cpu(surface, &snapshot.cpu);
    render_memory(surface, &snapshot.memory);
    render_processes(surface, &snapshot.processes);
    network::render_network(surface, &snapshot.network);
    speedtest::render_speedtest(surface, phase, &snapshot.speedtest);
    system::render_system(surface, &snapshot.system, &snapshot.cpu);
}

pub fn render_cpu(surface: &dyn DisplaySurface, cpu: &CpuInfo) {
    surface.write(region::CPU_USAGE, &format_percent(cpu.usage));
}

pub fn render_memory(surface: &dyn DisplaySurface, memory: &MemoryInfo) {
    surface.write(region::MEM_PERCENT, &format_percent(memory.percent));
    surface.write(region::MEM_USED, &format_bytes(memory.used));
    surface.write(region::MEM_TOTAL, &format_bytes(memory.total));
}

/// Rebuilds the process table in snapshot order.
pub fn render_processes(surface: &dyn DisplaySurface, processes: &[ProcessInfo]) {
    surface.clear_rows(region::PROCESSES_TABLE);
    for proc in processes {
        surface.push_row(
            region::PROCESSES_TABLE,
            vec![
                proc.pid.to_string(),
                proc.name.clone(),
                format_percent(proc.cpu),
                format_bytes(proc.memory.max(0.0).round() as u64),
                proc.status.clone(),
            ],
        );
    }
}
