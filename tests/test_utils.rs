//! Common utilities for luwen-glue tests
//!
//! Every test runs against the in-memory fabric from `luwen_glue::sim`, so nothing here needs
//! hardware. The helpers build the usual topologies and pick apart the error types.

use luwen_glue::{
    api::{
        arc_msg::{ArcMsgError, ArcMsgProtocolError},
        error::PlatformError,
        EthAddr,
    },
    sim::{SharedFabric, SimChip, SimFabric},
};

pub const LOCAL_BOARD_ID: u64 = 0x0000_0140_0000_0001;
pub const REMOTE_BOARD_ID: u64 = 0x0000_0140_0000_0002;

/// Chip on the given shelf of rack (0, 0).
#[allow(dead_code)]
pub fn shelf(shelf_x: u8) -> EthAddr {
    EthAddr {
        shelf_x,
        ..Default::default()
    }
}

/// A wormhole with its own host link plus one wormhole only reachable over ethernet.
#[allow(dead_code)]
pub fn wormhole_pair() -> SharedFabric {
    SimFabric::new()
        .with_chip(SimChip::wormhole().with_board_id(LOCAL_BOARD_ID))
        .with_chip(
            SimChip::wormhole()
                .at(shelf(1))
                .detached()
                .with_board_id(REMOTE_BOARD_ID),
        )
        .into_shared()
}

/// Pull the mailbox error out of a session error, if that is what it is.
#[allow(dead_code)]
pub fn protocol_error(err: &PlatformError) -> Option<&ArcMsgProtocolError> {
    match err {
        PlatformError::ArcMsgError(ArcMsgError::ProtocolError { source, .. }) => Some(source),
        _ => None,
    }
}
