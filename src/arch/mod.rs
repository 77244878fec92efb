//! Detalles específicos de la arquitectura objetivo.
//!
//! El conjunto de instrucciones es fijo: se emite ensamblador textual
//! de MIPS32 en el dialecto que aceptan SPIM y MARS.

mod mips;

pub use mips::Reg;
