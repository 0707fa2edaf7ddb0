// Author: Dustin Pilgrim
// License: MIT
//
// Engine <-> IPC message enum with oneshot replies, the same request/reply
// shape the teacher used for its own `ManagerMsg`: the IPC server never
// touches engine state directly, it only ever enqueues a message and awaits
// a oneshot reply.

use tokio::sync::oneshot;

use crate::core::engine::StatusSnapshot;

#[derive(Debug)]
pub enum EngineMsg {
    GetStatus { reply: oneshot::Sender<StatusSnapshot> },
    Stop { reply: oneshot::Sender<()> },
}
