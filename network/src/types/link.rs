//! Link state reported by the PHY.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSpeed {
    Mbps10,
    Mbps100,
    Mbps1000,
}

/// Negotiated link as seen by the PHY driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkState {
    pub up: bool,
    pub speed: LinkSpeed,
    pub full_duplex: bool,
}

impl LinkState {
    pub const DOWN: LinkState = LinkState {
        up: false,
        speed: LinkSpeed::Mbps10,
        full_duplex: false,
    };

    pub fn up(speed: LinkSpeed, full_duplex: bool) -> Self {
        Self { up: true, speed, full_duplex }
    }
}
