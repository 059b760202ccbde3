//! Protocol constants
//!
//! These constants define the frame markers, command categories and
//! sub-command identifiers used by the SNIC UART protocol.

// ============================================================================
// Frame Markers
// ============================================================================

/// Start of message.
pub const SOM: u8 = 0x02;
/// End of message.
pub const EOM: u8 = 0x04;

/// Bit forced on every header and trailer byte.
pub const TOP_BIT: u8 = 0x80;
/// ACK-required bit inside the high length byte.
pub const ACK_BIT: u8 = 0x40;

/// Largest message length expressible in the 14-bit length field.
pub const MAX_MESSAGE_LEN: usize = 0x3FFF;

// ============================================================================
// Command Categories
// ============================================================================

/// Negative acknowledgement.
pub const CMD_ID_NAK: u8 = 0x00;
/// General management.
pub const CMD_ID_GEN: u8 = 0x01;
/// WiFi control.
pub const CMD_ID_WIFI: u8 = 0x50;
/// Sockets, DHCP and HTTP.
pub const CMD_ID_SNIC: u8 = 0x70;
/// Acknowledgement.
pub const CMD_ID_ACK: u8 = 0x7F;

/// Short lowercase name of a command category, for logs and metric labels.
pub fn category_name(category: u8) -> &'static str {
    match category {
        CMD_ID_NAK => "nak",
        CMD_ID_GEN => "gen",
        CMD_ID_WIFI => "wifi",
        CMD_ID_SNIC => "snic",
        CMD_ID_ACK => "ack",
        _ => "unknown",
    }
}

// ============================================================================
// General Management Sub-commands (CMD_ID_GEN)
// ============================================================================

/// Power-up indication.
pub const GEN_PWR_UP_IND: u8 = 0x00;
/// Configure sleep.
pub const GEN_SLEEP_CFG_REQ: u8 = 0x05;
/// Get firmware version string.
pub const GEN_FW_VER_GET_REQ: u8 = 0x08;
/// Restore NVM to factory defaults.
pub const GEN_RESTORE_REQ: u8 = 0x09;
/// Soft reset.
pub const GEN_RESET_REQ: u8 = 0x0A;
/// Configure the UART interface.
pub const GEN_UART_CFG_REQ: u8 = 0x0B;

// ============================================================================
// WiFi Sub-commands (CMD_ID_WIFI)
// ============================================================================

/// Turn WiFi on.
pub const WIFI_ON_REQ: u8 = 0x00;
/// Turn WiFi off.
pub const WIFI_OFF_REQ: u8 = 0x01;
/// Join a network.
pub const WIFI_JOIN_REQ: u8 = 0x02;
/// Leave the joined network.
pub const WIFI_DISCONNECT_REQ: u8 = 0x03;
/// Get WiFi status.
pub const WIFI_GET_STATUS_REQ: u8 = 0x04;
/// Start a scan.
pub const WIFI_SCAN_REQ: u8 = 0x05;
/// Get STA RSSI.
pub const WIFI_GET_STA_RSSI_REQ: u8 = 0x06;
/// Soft AP control.
pub const WIFI_AP_CTRL_REQ: u8 = 0x07;
/// WPS.
pub const WIFI_WPS_REQ: u8 = 0x08;
/// List clients of the soft AP.
pub const WIFI_AP_GET_CLIENT_REQ: u8 = 0x0A;
/// Network status change indication.
pub const WIFI_NETWORK_STATUS_IND: u8 = 0x10;
/// Scan result indication.
pub const WIFI_SCAN_RESULT_IND: u8 = 0x11;

// ============================================================================
// SNIC Sub-commands (CMD_ID_SNIC)
// ============================================================================

/// Initialize the network stack.
pub const SNIC_INIT_REQ: u8 = 0x00;
/// Tear down the network stack.
pub const SNIC_CLEANUP_REQ: u8 = 0x01;
/// Send from a connected socket.
pub const SNIC_SEND_FROM_SOCKET_REQ: u8 = 0x02;
/// Close a socket.
pub const SNIC_CLOSE_SOCKET_REQ: u8 = 0x03;
/// Get a socket option.
pub const SNIC_GETSOCKOPT_REQ: u8 = 0x05;
/// Set a socket option.
pub const SNIC_SETSOCKOPT_REQ: u8 = 0x06;
/// Get socket name.
pub const SNIC_SOCKET_GETNAME_REQ: u8 = 0x07;
/// Send ARP.
pub const SNIC_SEND_ARP_REQ: u8 = 0x08;
/// Get DHCP info.
pub const SNIC_GET_DHCP_INFO_REQ: u8 = 0x09;
/// Resolve a host name.
pub const SNIC_RESOLVE_NAME_REQ: u8 = 0x0A;
/// Configure IP.
pub const SNIC_IP_CONFIG_REQ: u8 = 0x0B;
/// Configure data indication ACKs.
pub const SNIC_DATA_IND_ACK_CONFIG_REQ: u8 = 0x0C;
/// Create a TCP socket.
pub const SNIC_TCP_CREATE_SOCKET_REQ: u8 = 0x10;
/// Listen for TCP connections.
pub const SNIC_TCP_CREATE_CONNECTION_REQ: u8 = 0x11;
/// Connect to a TCP server.
pub const SNIC_TCP_CONNECT_TO_SERVER_REQ: u8 = 0x12;
/// Create a UDP socket.
pub const SNIC_UDP_CREATE_SOCKET_REQ: u8 = 0x13;
/// Start receiving on a UDP socket.
pub const SNIC_UDP_START_RECV_REQ: u8 = 0x14;
/// Send a UDP datagram without a socket.
pub const SNIC_UDP_SIMPLE_SEND_REQ: u8 = 0x15;
/// Send from a UDP socket.
pub const SNIC_UDP_SEND_FROM_SOCKET_REQ: u8 = 0x16;
/// HTTP request.
pub const SNIC_HTTP_REQ: u8 = 0x17;
/// More HTTP request body.
pub const SNIC_HTTP_MORE_REQ: u8 = 0x18;
/// HTTPS request.
pub const SNIC_HTTPS_REQ: u8 = 0x19;
/// Create an advanced TLS socket.
pub const SNIC_TCP_CREATE_ADV_TLS_SOCKET_REQ: u8 = 0x1A;
/// Create a simple TLS socket.
pub const SNIC_TCP_CREATE_SIMPLE_TLS_SOCKET_REQ: u8 = 0x1B;
/// TCP connection status indication.
pub const SNIC_TCP_CONNECTION_STATUS_IND: u8 = 0x20;
/// TCP client socket indication.
pub const SNIC_TCP_CLIENT_SOCKET_IND: u8 = 0x21;
/// Data received on a connection.
pub const SNIC_CONNECTION_RECV_IND: u8 = 0x22;
/// Datagram received on an unconnected UDP socket.
pub const SNIC_UDP_RECV_IND: u8 = 0x23;
/// ARP reply indication.
pub const SNIC_ARP_REPLY_IND: u8 = 0x24;
/// HTTP (chunked) response indication.
pub const SNIC_HTTP_RSP_IND: u8 = 0x25;

// ============================================================================
// Indications
// ============================================================================

/// Unsolicited messages the firmware can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicationKind {
    /// Module powered up; carries a [`ResetCode`].
    PowerUp,
    /// STA network up/down.
    NetworkStatus,
    /// One batch of scan results.
    ScanResult,
    /// TCP connection status for a socket.
    TcpConnectionStatus,
    /// A client connected to a listening TCP socket.
    TcpClientSocket,
    /// Data received on a connected socket.
    ConnectionReceive,
    /// Datagram received on an unconnected UDP socket.
    UdpReceive,
    /// ARP reply.
    ArpReply,
    /// HTTP response chunk.
    HttpResponse,
}

impl IndicationKind {
    /// Every indication kind.
    pub const ALL: [IndicationKind; 9] = [
        IndicationKind::PowerUp,
        IndicationKind::NetworkStatus,
        IndicationKind::ScanResult,
        IndicationKind::TcpConnectionStatus,
        IndicationKind::TcpClientSocket,
        IndicationKind::ConnectionReceive,
        IndicationKind::UdpReceive,
        IndicationKind::ArpReply,
        IndicationKind::HttpResponse,
    ];

    /// The `(category, sub_kind)` pair this indication arrives with.
    pub const fn key(self) -> (u8, u8) {
        match self {
            IndicationKind::PowerUp => (CMD_ID_GEN, GEN_PWR_UP_IND),
            IndicationKind::NetworkStatus => (CMD_ID_WIFI, WIFI_NETWORK_STATUS_IND),
            IndicationKind::ScanResult => (CMD_ID_WIFI, WIFI_SCAN_RESULT_IND),
            IndicationKind::TcpConnectionStatus => (CMD_ID_SNIC, SNIC_TCP_CONNECTION_STATUS_IND),
            IndicationKind::TcpClientSocket => (CMD_ID_SNIC, SNIC_TCP_CLIENT_SOCKET_IND),
            IndicationKind::ConnectionReceive => (CMD_ID_SNIC, SNIC_CONNECTION_RECV_IND),
            IndicationKind::UdpReceive => (CMD_ID_SNIC, SNIC_UDP_RECV_IND),
            IndicationKind::ArpReply => (CMD_ID_SNIC, SNIC_ARP_REPLY_IND),
            IndicationKind::HttpResponse => (CMD_ID_SNIC, SNIC_HTTP_RSP_IND),
        }
    }

    /// Look up the indication kind for a `(category, sub_kind)` pair.
    pub fn from_key(category: u8, sub_kind: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == (category, sub_kind))
    }

    /// Short lowercase name, for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            IndicationKind::PowerUp => "power_up",
            IndicationKind::NetworkStatus => "network_status",
            IndicationKind::ScanResult => "scan_result",
            IndicationKind::TcpConnectionStatus => "tcp_connection_status",
            IndicationKind::TcpClientSocket => "tcp_client_socket",
            IndicationKind::ConnectionReceive => "connection_receive",
            IndicationKind::UdpReceive => "udp_receive",
            IndicationKind::ArpReply => "arp_reply",
            IndicationKind::HttpResponse => "http_response",
        }
    }
}

impl std::fmt::Display for IndicationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Reset Codes (power-up indication)
// ============================================================================

/// Reason the module last reset, reported big-endian in the power-up indication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCode {
    /// Window watchdog.
    WindowWatchdog,
    /// Independent watchdog.
    IndependentWatchdog,
    /// Software reset.
    Software,
    /// Power-on / power-down reset.
    PowerOn,
    /// Reset pin.
    Pin,
    /// Any other value.
    Unknown(u16),
}

impl From<u16> for ResetCode {
    fn from(code: u16) -> Self {
        match code {
            0x4000 => ResetCode::WindowWatchdog,
            0x2000 => ResetCode::IndependentWatchdog,
            0x1000 => ResetCode::Software,
            0x0800 => ResetCode::PowerOn,
            0x0400 => ResetCode::Pin,
            other => ResetCode::Unknown(other),
        }
    }
}

impl std::fmt::Display for ResetCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetCode::WindowWatchdog => write!(f, "window watchdog"),
            ResetCode::IndependentWatchdog => write!(f, "independent watchdog"),
            ResetCode::Software => write!(f, "software reset"),
            ResetCode::PowerOn => write!(f, "power-on"),
            ResetCode::Pin => write!(f, "reset pin"),
            ResetCode::Unknown(code) => write!(f, "unknown (0x{:04X})", code),
        }
    }
}
