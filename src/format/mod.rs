// Mangled stream wire format.
//
// - `opcode`  — control byte ranges, constants, `Op` parse/write
// - `decoder` — `Unmangler` and the opcode listing iterator

pub mod decoder;
pub mod opcode;

pub use decoder::{OpIterator, Unmangler, read_header, unmangle};
pub use opcode::{HEADER_LEN, Op};
