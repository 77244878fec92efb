//! Compilador de un subconjunto de C a ensamblador MIPS.
//!
//! # Una sola pasada
//! No existen flujo de tokens, árbol sintáctico ni representación
//! intermedia. Primero se extraen las constantes de hilera del texto
//! crudo en [`strings`], lo cual produce la sección de datos. Luego
//! un único recorrido descendente recursivo analiza cada declaración
//! de nivel superior y emite instrucciones conforme avanza.
//!
//! # Tipos
//! Los declaradores de C se representan en [`types`] como secuencias
//! acotadas de entradas. Su análisis sintáctico, con las reglas de
//! precedencia de punteros, funciones y listas, ocurre en [`parse`].
//!
//! # Diagnósticos
//! Todo error es fatal y se reporta anclado a la posición del cursor
//! al momento de detectarse, ver [`error`]. Las advertencias se
//! escriben al flujo de diagnósticos sin interrumpir la compilación.

#[macro_use]
mod macros;

pub mod error;
pub mod parse;
pub mod semantic;
pub mod source;
pub mod strings;
pub mod types;

mod arch;
mod codegen;

use crate::{codegen::Compiler, error::Compile, parse::Limits};
use log::info;
use std::io::Write;

/// Opciones de compilación.
#[derive(Copy, Clone, Debug, Default)]
pub struct Options {
    pub limits: Limits,
}

/// Compila un programa completo.
///
/// El código ensamblador se escribe a `output` conforme se genera, por
/// lo cual este puede quedar incompleto si ocurre un error. Las
/// advertencias se escriben a `diagnostics`.
pub fn compile<W, D>(
    source: &str,
    options: &Options,
    output: &mut W,
    diagnostics: &mut D,
) -> Compile<()>
where
    W: Write,
    D: Write,
{
    writeln!(output, ".data")?;
    let strings = strings::extract(source, output)?;
    info!("{} string constants", strings.len());
    writeln!(output, ".text\n")?;

    let mut compiler = Compiler::new(source, options.limits, strings, output, diagnostics);
    compiler.program()
}
