//! Implementación para MIPS32.
//!
//! # Manual de ISA
//! <https://www.cs.cornell.edu/courses/cs3410/2008fa/MIPS_Vol2.pdf>
//!
//! No se sigue la ABI o32: los argumentos y el valor de retorno
//! viajan por la pila, y los registros `$s0`-`$s7` son responsabilidad
//! de quien llama.

use std::fmt;

/// Registro de procesador.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg {
    /// Registros temporales, usados como scratch por un único emisor.
    T(u8),

    /// Registros asignables a valores intermedios.
    S(u8),
}

impl Reg {
    pub const T0: Reg = Reg::T(0);
    pub const T1: Reg = Reg::T(1);
    pub const T2: Reg = Reg::T(2);

    /// Registros disponibles para el asignador, en orden de preferencia.
    pub const FILE: [Reg; 8] = [
        Reg::S(0),
        Reg::S(1),
        Reg::S(2),
        Reg::S(3),
        Reg::S(4),
        Reg::S(5),
        Reg::S(6),
        Reg::S(7),
    ];
}

impl fmt::Display for Reg {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg::T(number) => write!(formatter, "$t{}", number),
            Reg::S(number) => write!(formatter, "$s{}", number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_names() {
        assert_eq!(Reg::T0.to_string(), "$t0");
        assert_eq!(Reg::T2.to_string(), "$t2");
        assert_eq!(Reg::FILE[7].to_string(), "$s7");
    }
}
