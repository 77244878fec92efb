//! Generación de código en una sola pasada.
//!
//! No existe representación intermedia: el [`Compiler`] analiza el
//! texto fuente y emite instrucciones en el mismo recorrido. Las
//! referencias hacia adelante se resuelven únicamente por etiquetas
//! `__L<n>`, cuya numeración es monótona en todo el programa.
//!
//! # Marco de pila
//! Sea `F` el tamaño de las variables locales de una función y `S` el
//! valor de `$sp` al entrar a esta. Tras el prólogo `$sp = S - (F + 8)`,
//! el valor de retorno se ubica en `S - 4` y la dirección de retorno
//! en `S`. Los argumentos y locales se ubican hacia abajo a partir
//! de `S - 8`, en orden de declaración.
//!
//! El prólogo y el epílogo ajustan `$sp` con el inmediato con signo de
//! 16 bits de `addi`, lo cual acota `F + 8` a 32767 bytes.

use crate::{
    arch::Reg,
    error::{Compile, CompileError, CompileWarning, Diagnostic},
    parse::Limits,
    semantic::Scopes,
    source::{Cursor, Located},
    strings::StringTable,
    types::{align4, Type},
};

use std::io::Write;

mod expr;
mod program;
mod regs;

pub use regs::{Allocations, Data};

/// Tamaño máximo de argumentos y locales de una función.
const MAX_FRAME: u32 = i16::MAX as u32 - 8;

/// Valor intermedio ya materializado.
#[derive(Clone, Debug)]
pub struct Value {
    pub ty: Type,
    pub data: Data,
}

/// Estado de la función en compilación.
#[derive(Default)]
struct Frame {
    /// Bytes ocupados por argumentos y locales.
    size: u32,
    return_type: Type,
}

/// Contexto de compilación.
pub struct Compiler<'a, 'o> {
    cursor: Cursor<'a>,
    output: &'o mut dyn Write,
    diagnostics: &'o mut dyn Write,
    limits: Limits,
    strings: StringTable,
    scopes: Scopes,
    regs: Allocations,
    labels: u32,
    frame: Frame,
}

impl<'a, 'o> Compiler<'a, 'o> {
    pub fn new(
        source: &'a str,
        limits: Limits,
        strings: StringTable,
        output: &'o mut dyn Write,
        diagnostics: &'o mut dyn Write,
    ) -> Self {
        Compiler {
            cursor: Cursor::new(source),
            output,
            diagnostics,
            limits,
            strings,
            scopes: Scopes::default(),
            regs: Allocations::default(),
            labels: 0,
            frame: Frame::default(),
        }
    }

    /// Flujo de salida de código ensamblador.
    fn output(&mut self) -> &mut (dyn Write + 'o) {
        self.output
    }

    /// Falla en la posición actual del cursor.
    fn fail<T, E: Into<CompileError>>(&self, error: E) -> Compile<T> {
        Err(Located::at(error.into(), self.cursor.location()))
    }

    /// Reporta una advertencia en la posición actual del cursor.
    fn warn(&mut self, warning: CompileWarning) -> Compile<()> {
        let warning = Located::at(warning, self.cursor.location());
        self.report(warning)
    }

    fn report(&mut self, warning: Located<CompileWarning>) -> Compile<()> {
        log::debug!("warning at line {}", warning.location().line());
        write!(self.diagnostics, "{}", Diagnostic::from(warning))?;

        Ok(())
    }

    fn expect(&mut self, c: char) -> Compile<()> {
        self.cursor.skip_whitespace();
        if self.cursor.eat(c) {
            Ok(())
        } else {
            self.fail(CompileError::Expected(c))
        }
    }

    /// Reserva una nueva etiqueta.
    fn new_label(&mut self) -> u32 {
        let label = self.labels;
        self.labels += 1;

        label
    }

    fn place_label(&mut self, label: u32) -> Compile<()> {
        directive!(self, "\n__L{}:", label)?;
        Ok(())
    }

    /// Reserva `size` bytes en el marco y retorna su posición.
    fn grow_frame(&mut self, size: u32) -> Compile<u32> {
        let position = self.frame.size;
        match position.checked_add(size) {
            Some(total) if total <= MAX_FRAME => {
                self.frame.size = total;
                Ok(position)
            }

            _ => self.fail(CompileError::FrameTooLarge(MAX_FRAME)),
        }
    }

    /// Posición relativa a `$sp` de una variable local.
    fn frame_offset(&self, position: u32, ty: &Type) -> Compile<u32> {
        let top = self.frame.size.checked_add(4);
        let end = position.checked_add(align4(ty.byte_size()));

        match top.zip(end).and_then(|(top, end)| top.checked_sub(end)) {
            Some(offset) => Ok(offset),
            None => self.fail(CompileError::FrameTooLarge(MAX_FRAME)),
        }
    }

    /// Posición relativa a `$sp` del valor de retorno.
    fn return_slot(&self) -> Compile<u32> {
        match self.frame.size.checked_add(4) {
            Some(slot) => Ok(slot),
            None => self.fail(CompileError::FrameTooLarge(MAX_FRAME)),
        }
    }

    /// Extiende el marco de pila.
    fn prologue(&mut self) -> Compile<()> {
        let size = self.frame.size as i64 + 8;
        emit!(self, "addi", "$sp, $sp, {}", -size)?;
        Ok(())
    }

    /// Destruye el marco de pila y retorna.
    fn epilogue(&mut self) -> Compile<()> {
        let size = match self.frame.size.checked_add(8) {
            Some(size) => size,
            None => return self.fail(CompileError::FrameTooLarge(MAX_FRAME)),
        };

        emit!(self, "addi", "$sp, $sp, {}", size)?;
        emit!(self, "lw", "$ra, 0($sp)")?;
        emit!(self, "jr", "$ra")?;

        Ok(())
    }

    /// Obtiene un registro con el contenido de `data`.
    ///
    /// Los temporales de pila se cargan a `scratch`.
    fn load(&mut self, data: Data, scratch: Reg) -> Compile<Reg> {
        match data {
            Data::Register(reg) => Ok(reg),
            Data::Stack(depth) => {
                emit!(self, "lw", "{}, -{}($sp)", scratch, depth)?;
                Ok(scratch)
            }
        }
    }

    /// Registro en el cual calcular un valor destinado a `data`.
    fn target(data: Data, scratch: Reg) -> Reg {
        match data {
            Data::Register(reg) => reg,
            Data::Stack(_) => scratch,
        }
    }

    /// Deposita en `data` un valor calculado en `reg`.
    fn commit(&mut self, reg: Reg, data: Data) -> Compile<()> {
        match data {
            Data::Register(target) if target == reg => (),
            Data::Register(target) => emit!(self, "move", "{}, {}", target, reg)?,
            Data::Stack(depth) => emit!(self, "sw", "{}, -{}($sp)", reg, depth)?,
        }

        Ok(())
    }

    /// Salta a `label` si el valor es cero.
    fn branch_if_false(&mut self, data: Data, label: u32) -> Compile<()> {
        let reg = self.load(data, Reg::T0)?;
        emit!(self, "beq", "{}, $zero, __L{}", reg, label)?;

        Ok(())
    }
}
