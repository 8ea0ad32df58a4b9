pub mod archive;
pub mod assemble;
pub mod keys;
pub mod verify;
