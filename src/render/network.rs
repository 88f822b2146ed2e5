use super::region;
use crate::format::{format_bytes, format_speed};
use crate::snapshot::{Connection, InterfaceInfo, NetworkInfo};
use crate::surface::DisplaySurface;

/// Rows shown per protocol in the connection tables.
pub const MAX_CONNECTION_ROWS: usize = 10;

pub fn render_network(surface: &dyn DisplaySurface, network: &NetworkInfo) {
    render_interfaces(surface, &network.interfaces);
    render_connections(surface, region::TCP_TABLE, &network.tcp);
    render_connections(surface, region::UDP_TABLE, &network.udp);

    surface.write(region::TCP_COUNT, &network.tcp_count.to_string());
    surface.write(region::UDP_COUNT, &network.udp_count.to_string());
}

pub fn render_interfaces(surface: &dyn DisplaySurface, interfaces: &[InterfaceInfo]) {
    surface.clear_rows(region::INTERFACES_TABLE);
    for iface in interfaces {
        surface.push_row(
            region::INTERFACES_TABLE,
            vec![
                iface.name.clone(),
                format_bytes(iface.bytes_sent),
                format_bytes(iface.bytes_recv),
                format_speed(iface.speed),
            ],
        );
    }
}

/// Rebuilds `table` from the first [`MAX_CONNECTION_ROWS`] connections.
pub fn render_connections(surface: &dyn DisplaySurface, table: &str, connections: &[Connection]) {
    surface.clear_rows(table);
    for conn in connections.iter().take(MAX_CONNECTION_ROWS) {
        let pid = match conn.pid {
            Some(pid) if pid != 0 => pid.to_string(),
            _ => "-".to_string(),
        };
        surface.push_row(
            table,
            vec![
                conn.local_addr.clone(),
                conn.remote_addr.clone(),
                conn.status.clone(),
                pid,
            ],
        );
    }
}
