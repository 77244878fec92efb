//! Modelo de tipos de declaradores.
//!
//! Un tipo se representa como una secuencia acotada de entradas que se
//! lee de izquierda a derecha, desde el declarador más externo hacia el
//! tipo base. Por ejemplo, `int (*f)(void)` se codifica como
//! `[PointerTo, FunctionBegin, Void, FunctionEnd, Int]`: "puntero a
//! función (void) que retorna int".
//!
//! Las entradas terminales son los tipos base `void`, `int` y `char`.
//! Las entradas estructurales introducen anidamiento y requieren seguir
//! recorriendo la secuencia para llegar al tipo base.

use std::{
    collections::VecDeque,
    fmt::{self, Display},
};

use thiserror::Error;

/// Cantidad máxima de entradas en un tipo.
pub const CAPACITY: usize = 64;

/// Tamaño de palabra de la arquitectura objetivo.
pub const WORD_SIZE: u32 = 4;

/// Error de capacidad.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("Type is nested too deeply (at most {CAPACITY} type entries)")]
    Overflow,
}

/// Una entrada de tipo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    Void,
    Int,
    Char,
    PointerTo,
    FunctionBegin,
    FunctionEnd,
    ListOf(u32),
}

impl Entry {
    /// Determina si esta entrada introduce estructura anidada.
    pub fn is_structural(self) -> bool {
        !matches!(self, Entry::Void | Entry::Int | Entry::Char)
    }
}

/// Tipo de declarador.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Type {
    entries: VecDeque<Entry>,
}

impl Type {
    /// Tipo sin entradas.
    pub fn empty() -> Self {
        Type::default()
    }

    /// Tipo de una sola entrada.
    pub fn of(entry: Entry) -> Self {
        Type {
            entries: std::iter::once(entry).collect(),
        }
    }

    pub fn void() -> Self {
        Type::of(Entry::Void)
    }

    pub fn int() -> Self {
        Type::of(Entry::Int)
    }

    pub fn char() -> Self {
        Type::of(Entry::Char)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = Entry> + '_ {
        self.entries.iter().copied()
    }

    /// Longitudes de las entradas `ListOf`, en el orden en que aparecen.
    pub fn list_lengths(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries().filter_map(|entry| match entry {
            Entry::ListOf(length) => Some(length),
            _ => None,
        })
    }

    /// Antepone una entrada.
    pub fn push_front(&mut self, entry: Entry) -> Result<(), TypeError> {
        if self.entries.len() >= CAPACITY {
            return Err(TypeError::Overflow);
        }

        self.entries.push_front(entry);
        Ok(())
    }

    /// Observa la entrada inicial. `None` indica que no quedan entradas.
    pub fn peek_front(&self) -> Option<Entry> {
        self.entries.front().copied()
    }

    /// Consume la entrada inicial.
    pub fn pop_front(&mut self) -> Option<Entry> {
        self.entries.pop_front()
    }

    /// Concatena `front` completa delante de este tipo.
    pub fn splice_front(&mut self, front: Type) -> Result<(), TypeError> {
        if self.entries.len() + front.entries.len() > CAPACITY {
            return Err(TypeError::Overflow);
        }

        for entry in front.entries.into_iter().rev() {
            self.entries.push_front(entry);
        }

        Ok(())
    }

    /// Construye el tipo "puntero a `self`".
    pub fn pointer_to(mut self) -> Result<Type, TypeError> {
        self.push_front(Entry::PointerTo)?;
        Ok(self)
    }

    /// Extrae el tipo del siguiente argumento de una secuencia de argumentos.
    ///
    /// Se consumen entradas mientras sean estructurales o mientras haya
    /// pares `FunctionBegin`/`FunctionEnd` abiertos, de modo que un
    /// argumento que sea a su vez un tipo función no se corte en su
    /// propio `FunctionEnd`. Finalmente se consume la entrada terminal.
    pub fn pop_argument(&mut self) -> Type {
        let mut argument = Type::empty();
        let mut open_functions = 0u32;

        while let Some(entry) = self.entries.pop_front() {
            argument.entries.push_back(entry);

            match entry {
                Entry::FunctionBegin => open_functions += 1,
                Entry::FunctionEnd if open_functions > 0 => open_functions -= 1,
                _ => (),
            }

            if !entry.is_structural() && open_functions == 0 {
                break;
            }
        }

        argument
    }

    /// Tipo resultante de eliminar la entrada inicial.
    pub fn rest(&self) -> Type {
        Type {
            entries: self.entries.iter().skip(1).copied().collect(),
        }
    }

    pub fn is_void(&self) -> bool {
        self.is(Entry::Void)
    }

    pub fn is_function(&self) -> bool {
        self.peek_front() == Some(Entry::FunctionBegin)
    }

    pub fn is_pointer(&self) -> bool {
        self.peek_front() == Some(Entry::PointerTo)
    }

    pub fn is_list(&self) -> bool {
        matches!(self.peek_front(), Some(Entry::ListOf(_)))
    }

    /// `int` o `char`.
    pub fn is_integer(&self) -> bool {
        self.is(Entry::Int) || self.is(Entry::Char)
    }

    pub fn is_char(&self) -> bool {
        self.is(Entry::Char)
    }

    /// Tipo al que apunta un puntero.
    pub fn pointee(&self) -> Option<Type> {
        if self.is_pointer() {
            Some(self.rest())
        } else {
            None
        }
    }

    /// Descompone un tipo función en tipos de argumentos y tipo de retorno.
    ///
    /// Un único argumento `void` equivale a una lista vacía.
    pub fn signature(&self) -> Option<(Vec<Type>, Type)> {
        if !self.is_function() {
            return None;
        }

        let mut rest = self.rest();
        let mut arguments = Vec::new();
        while !matches!(rest.peek_front(), Some(Entry::FunctionEnd) | None) {
            arguments.push(rest.pop_argument());
        }

        rest.pop_front();
        if arguments.len() == 1 && arguments[0].is_void() {
            arguments.clear();
        }

        Some((arguments, rest))
    }

    /// Tipo que resulta de usar un objeto de este tipo como valor.
    ///
    /// Las listas decaen a punteros a su primer elemento y las
    /// funciones a punteros a función.
    pub fn decay(&self) -> Result<Type, TypeError> {
        if self.is_list() {
            self.rest().pointer_to()
        } else if self.is_function() {
            self.clone().pointer_to()
        } else {
            Ok(self.clone())
        }
    }

    /// Tamaño en bytes de un objeto de este tipo.
    pub fn byte_size(&self) -> u32 {
        size_of(self.entries.iter().copied())
    }

    fn is(&self, entry: Entry) -> bool {
        self.entries.len() == 1 && self.entries[0] == entry
    }
}

/// Redondea hacia arriba al siguiente múltiplo de 4.
pub fn align4(size: u32) -> u32 {
    size.saturating_add(WORD_SIZE - 1) / WORD_SIZE * WORD_SIZE
}

fn size_of<I>(mut entries: I) -> u32
where
    I: Iterator<Item = Entry>,
{
    match entries.next() {
        None | Some(Entry::Void) => 0,
        Some(Entry::Char) => 1,
        Some(Entry::Int | Entry::PointerTo | Entry::FunctionBegin | Entry::FunctionEnd) => {
            WORD_SIZE
        }

        Some(Entry::ListOf(length)) => length.saturating_mul(size_of(entries)),
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<Entry> = self.entries().collect();
        let rest = write_type(fmt, &entries)?;

        // Entradas sobrantes, no deberían ocurrir en tipos bien formados
        for entry in rest {
            write!(fmt, " {:?}", entry)?;
        }

        Ok(())
    }
}

/// Escribe un tipo completo y retorna las entradas que le siguen.
fn write_type<'e>(
    fmt: &mut fmt::Formatter<'_>,
    entries: &'e [Entry],
) -> Result<&'e [Entry], fmt::Error> {
    let (first, mut rest) = match entries.split_first() {
        Some((first, rest)) => (*first, rest),
        None => {
            fmt.write_str("<empty>")?;
            return Ok(entries);
        }
    };

    match first {
        Entry::Void => fmt.write_str("void")?,
        Entry::Int => fmt.write_str("int")?,
        Entry::Char => fmt.write_str("char")?,
        Entry::FunctionEnd => fmt.write_str("<unmatched function end>")?,

        Entry::PointerTo => {
            fmt.write_str("pointer to ")?;
            rest = write_type(fmt, rest)?;
        }

        Entry::ListOf(length) => {
            write!(fmt, "list of length {} of ", length)?;
            rest = write_type(fmt, rest)?;
        }

        Entry::FunctionBegin => {
            fmt.write_str("function (")?;

            let mut first_argument = true;
            loop {
                match rest.split_first() {
                    None => return Ok(rest),
                    Some((Entry::FunctionEnd, after)) => {
                        rest = after;
                        break;
                    }

                    Some(_) => {
                        if !first_argument {
                            fmt.write_str(", ")?;
                        }

                        first_argument = false;
                        rest = write_type(fmt, rest)?;
                    }
                }
            }

            fmt.write_str(") returning ")?;
            rest = write_type(fmt, rest)?;
        }
    }

    Ok(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(entries: &[Entry]) -> Type {
        let mut ty = Type::empty();
        for &entry in entries.iter().rev() {
            ty.push_front(entry).unwrap();
        }

        ty
    }

    #[test]
    fn push_peek_pop() {
        let mut ty = Type::int();
        ty.push_front(Entry::PointerTo).unwrap();

        assert_eq!(ty.peek_front(), Some(Entry::PointerTo));
        assert_eq!(ty.pop_front(), Some(Entry::PointerTo));
        assert_eq!(ty.peek_front(), Some(Entry::Int));
        assert_eq!(ty.pop_front(), Some(Entry::Int));
        assert_eq!(ty.peek_front(), None);
        assert_eq!(ty.pop_front(), None);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut ty = Type::int();
        for _ in 1..CAPACITY {
            ty.push_front(Entry::PointerTo).unwrap();
        }

        assert_eq!(ty.len(), CAPACITY);
        assert_eq!(ty.push_front(Entry::PointerTo), Err(TypeError::Overflow));
        assert_eq!(ty.clone().splice_front(Type::char()), Err(TypeError::Overflow));
        assert_eq!(ty.len(), CAPACITY);
    }

    #[test]
    fn splice_keeps_order() {
        let mut ty = Type::int();
        ty.splice_front(build(&[Entry::PointerTo, Entry::ListOf(5)]))
            .unwrap();

        assert_eq!(
            ty.entries().collect::<Vec<_>>(),
            [Entry::PointerTo, Entry::ListOf(5), Entry::Int]
        );
    }

    #[test]
    fn argument_extraction_skips_nested_functions() {
        // (int (*)(char), char) returning int
        let mut ty = build(&[
            Entry::PointerTo,
            Entry::FunctionBegin,
            Entry::Char,
            Entry::FunctionEnd,
            Entry::Int,
            Entry::Char,
            Entry::FunctionEnd,
            Entry::Int,
        ]);

        let first = ty.pop_argument();
        assert_eq!(first.to_string(), "pointer to function (char) returning int");

        let second = ty.pop_argument();
        assert_eq!(second, Type::char());
        assert_eq!(ty.pop_front(), Some(Entry::FunctionEnd));
        assert_eq!(ty, Type::int());
    }

    #[test]
    fn signatures() {
        let ty = build(&[
            Entry::FunctionBegin,
            Entry::Void,
            Entry::FunctionEnd,
            Entry::PointerTo,
            Entry::Char,
        ]);

        let (arguments, returns) = ty.signature().unwrap();
        assert!(arguments.is_empty());
        assert_eq!(returns, Type::char().pointer_to().unwrap());
        assert_eq!(Type::int().signature(), None);
    }

    #[test]
    fn sizes() {
        assert_eq!(Type::char().byte_size(), 1);
        assert_eq!(Type::int().byte_size(), 4);
        assert_eq!(Type::void().byte_size(), 0);

        let matrix = build(&[Entry::ListOf(3), Entry::ListOf(5), Entry::Char]);
        assert_eq!(matrix.byte_size(), 15);
        assert_eq!(align4(matrix.byte_size()), 16);
        assert_eq!(matrix.list_lengths().collect::<Vec<_>>(), [3, 5]);
    }

    #[test]
    fn decay() {
        let matrix = build(&[Entry::ListOf(3), Entry::ListOf(5), Entry::Char]);
        assert_eq!(
            matrix.decay().unwrap(),
            build(&[Entry::PointerTo, Entry::ListOf(5), Entry::Char])
        );

        let function = build(&[Entry::FunctionBegin, Entry::Void, Entry::FunctionEnd, Entry::Int]);
        assert_eq!(function.decay().unwrap().pointee(), Some(function));
        assert_eq!(Type::int().decay().unwrap(), Type::int());
    }

    #[test]
    fn rendering() {
        let ty = build(&[
            Entry::ListOf(2),
            Entry::PointerTo,
            Entry::FunctionBegin,
            Entry::Int,
            Entry::Char,
            Entry::FunctionEnd,
            Entry::Void,
        ]);

        assert_eq!(
            ty.to_string(),
            "list of length 2 of pointer to function (int, char) returning void"
        );
    }
}
