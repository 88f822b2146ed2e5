use super::region;
use crate::snapshot::{present, CpuInfo, SystemInfo};
use crate::surface::DisplaySurface;

const UNKNOWN: &str = "Unknown";
const ENABLED: &str = "✓ Enabled";
const DISABLED: &str = "✗ Disabled";

/// Static host details. The CPU details live in this section as well.
pub fn render_system(surface: &dyn DisplaySurface, system: &SystemInfo, cpu: &CpuInfo) {
    surface.write(region::CPU_MODEL, or_unknown(&cpu.model));
    let cores = match present(&cpu.frequency) {
        Some(freq) => format!("{} @ {}", cpu.cores, freq),
        None => cpu.cores.to_string(),
    };
    surface.write(region::CPU_CORES_DETAILED, &cores);
    surface.write(region::CPU_CACHE, or_unknown(&cpu.cache));
    surface.write(region::CPU_AES, capability(cpu.aes));
    surface.write(region::CPU_VMX, capability(cpu.vmx));

    surface.write(
        region::TOTAL_DISK,
        &format!(
            "{} ({} Used)",
            or_unknown(&system.total_disk),
            or_unknown(&system.used_disk)
        ),
    );
    surface.write(region::OS_INFO, or_unknown(&system.os));
    surface.write(region::KERNEL_INFO, or_unknown(&system.kernel));
    surface.write(region::ARCH_INFO, or_unknown(&system.arch));
    surface.write(region::UPTIME_INFO, or_unknown(&system.uptime));
    surface.write(region::LOAD_AVG, or_unknown(&system.load_average));
    surface.write(region::TCP_CC, or_unknown(&system.tcp_cc));
    surface.write(region::VIRT_INFO, or_unknown(&system.virtualization));
    surface.write(
        region::IP_STATUS,
        &format!(
            "{} / {}",
            or_unknown(&system.ipv4_status),
            or_unknown(&system.ipv6_status)
        ),
    );
    surface.write(region::ORGANIZATION, or_unknown(&system.organization));
    surface.write(region::LOCATION, or_unknown(&system.location));
}

fn or_unknown(value: &Option<String>) -> &str {
    present(value).unwrap_or(UNKNOWN)
}

fn capability(flag: bool) -> &'static str {
    if flag {
        ENABLED
    } else {
        DISABLED
    }
}
