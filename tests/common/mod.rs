#![allow(dead_code)]

use chainguard::ssa::{ProgramBuilder, TypeId};

/// Types shared by the analyzer fixtures: the tracked builder pointer,
/// the address of a local slot holding one, and a few bystanders.
pub struct Types {
    pub handle: TypeId,
    pub slot: TypeId,
    pub int: TypeId,
    pub iface: TypeId,
    pub chan: TypeId,
    pub map: TypeId,
}

pub fn handle_types(pb: &mut ProgramBuilder) -> Types {
    let db = pb.types_mut().named("gorm.io/gorm", "DB");
    let handle = pb.types_mut().pointer_to(db);
    let slot = pb.types_mut().pointer_to(handle);
    let int = pb.types_mut().basic("int");
    let iface = pb.types_mut().interface(None);
    let chan = pb.types_mut().chan_of(handle);
    let string = pb.types_mut().basic("string");
    let map = pb.types_mut().map_of(string, handle);
    Types {
        handle,
        slot,
        int,
        iface,
        chan,
        map,
    }
}
