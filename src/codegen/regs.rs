//! Asignación de almacenamiento para valores intermedios.
//!
//! Cada valor intermedio vive en uno de los registros `$s0`-`$s7` o,
//! cuando estos se agotan, en un temporal de pila de 4 bytes ubicado
//! por debajo de `$sp`. El temporal de profundidad `k` ocupa `-k($sp)`.

use crate::arch::Reg;
use bitflags::bitflags;

bitflags! {
    /// Conjunto de registros asignables ocupados.
    pub struct RegisterSet: u8 {
        const S0 = 1 << 0;
        const S1 = 1 << 1;
        const S2 = 1 << 2;
        const S3 = 1 << 3;
        const S4 = 1 << 4;
        const S5 = 1 << 5;
        const S6 = 1 << 6;
        const S7 = 1 << 7;
    }
}

impl RegisterSet {
    /// Conjunto que contiene únicamente al registro `$s<index>`.
    fn single(index: usize) -> Self {
        RegisterSet::from_bits_truncate(1 << index)
    }
}

/// Ubicación de un valor intermedio.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Data {
    Register(Reg),

    /// Temporal de pila en `-k($sp)`.
    Stack(u32),
}

/// Estado del asignador durante la compilación de una función.
#[derive(Default, Debug)]
pub struct Allocations {
    registers: RegisterSet,
    stack: Vec<bool>,
}

impl Default for RegisterSet {
    fn default() -> Self {
        RegisterSet::empty()
    }
}

impl Allocations {
    /// Obtiene almacenamiento libre, prefiriendo registros.
    pub fn allocate(&mut self) -> Data {
        let free = (0..Reg::FILE.len())
            .find(|&index| !self.registers.contains(RegisterSet::single(index)));

        if let Some(index) = free {
            self.registers.insert(RegisterSet::single(index));
            return Data::Register(Reg::FILE[index]);
        }

        let slot = match self.stack.iter().position(|busy| !busy) {
            Some(slot) => slot,
            None => {
                self.stack.push(false);
                self.stack.len() - 1
            }
        };

        self.stack[slot] = true;
        Data::Stack(Self::depth_of(slot))
    }

    /// Libera almacenamiento previamente obtenido con [`Allocations::allocate()`].
    pub fn deallocate(&mut self, data: Data) {
        match data {
            Data::Register(reg) => {
                if let Some(index) = Reg::FILE.iter().position(|&other| other == reg) {
                    self.registers.remove(RegisterSet::single(index));
                }
            }

            Data::Stack(depth) => {
                let slot = (depth / 4) as usize;
                if let Some(busy) = slot.checked_sub(1).and_then(|slot| self.stack.get_mut(slot)) {
                    *busy = false;
                }
            }
        }
    }

    /// Registros ocupados, en orden.
    pub fn live_registers(&self) -> impl Iterator<Item = Reg> + '_ {
        (0..Reg::FILE.len())
            .filter(move |&index| self.registers.contains(RegisterSet::single(index)))
            .map(|index| Reg::FILE[index])
    }

    /// Profundidad del temporal de pila ocupado más profundo, o 0.
    pub fn depth(&self) -> u32 {
        self.stack
            .iter()
            .rposition(|&busy| busy)
            .map_or(0, Self::depth_of)
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty() && !self.stack.contains(&true)
    }

    pub fn reset(&mut self) {
        self.registers = RegisterSet::empty();
        self.stack.clear();
    }

    fn depth_of(slot: usize) -> u32 {
        4 * (slot as u32 + 1)
    }
}
