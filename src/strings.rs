//! Extracción de constantes de hilera.
//!
//! Antes de generar cualquier instrucción se recorre el texto fuente
//! crudo en busca de literales entre comillas dobles. Cada uno recibe
//! una etiqueta `__str<n>` secuencial y se emite tal cual en la sección
//! de datos. Las secuencias de escape no se interpretan: el ensamblador
//! las resuelve, así que basta con no terminar el literal en `\"`.

use crate::{
    error::{Compile, CompileError},
    source::{Cursor, Located},
};

use std::{collections::HashMap, io::Write};

/// Etiquetas asignadas a cada literal, indexadas por la posición
/// en bytes de su comilla de apertura.
#[derive(Debug, Default)]
pub struct StringTable {
    labels: HashMap<usize, u32>,
}

impl StringTable {
    /// Número de etiqueta del literal que abre en `offset`.
    pub fn label(&self, offset: usize) -> Option<u32> {
        self.labels.get(&offset).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Encuentra el final de un literal.
///
/// `body` es el texto inmediatamente posterior a la comilla de apertura.
/// Retorna la posición en bytes de la comilla de cierre, si existe.
pub fn literal_end(body: &str) -> Option<usize> {
    let mut chars = body.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '"' => return Some(index),
            '\\' => {
                chars.next();
            }
            _ => (),
        }
    }

    None
}

/// Emite todas las constantes de hilera de `source`, en orden de aparición.
pub fn extract<W: Write + ?Sized>(source: &str, output: &mut W) -> Compile<StringTable> {
    let mut table = StringTable::default();
    let mut cursor = Cursor::new(source);

    while !cursor.is_eof() {
        if cursor.peek() != Some('"') {
            cursor.bump();
            continue;
        }

        let opening = cursor.clone();
        cursor.bump();

        let body = cursor.rest();
        let length = match literal_end(body) {
            Some(length) => length,
            None => {
                let error = CompileError::UnterminatedString;
                return Err(Located::at(error, opening.location()));
            }
        };

        let label = table.labels.len() as u32;
        writeln!(output, "__str{}:\t.asciiz \"{}\"", label, &body[..length])?;
        table.labels.insert(opening.offset(), label);

        // Se avanza por el cursor para mantener la cuenta de líneas
        let closing = cursor.offset() + length;
        while cursor.offset() <= closing {
            cursor.bump();
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> (String, StringTable) {
        let mut output = Vec::new();
        let table = extract(source, &mut output).unwrap();
        (String::from_utf8(output).unwrap(), table)
    }

    #[test]
    fn literals_in_order() {
        let source = "f(\"one\");\ng(\"two\", \"\");";
        let (output, table) = run(source);

        assert_eq!(
            output,
            "__str0:\t.asciiz \"one\"\n__str1:\t.asciiz \"two\"\n__str2:\t.asciiz \"\"\n"
        );

        assert_eq!(table.len(), 3);
        assert_eq!(table.label(2), Some(0));
        assert_eq!(table.label(source.find("\"two").unwrap()), Some(1));
        assert_eq!(table.label(0), None);
    }

    #[test]
    fn escaped_quotes_do_not_terminate() {
        let source = r#"s = "a\"b"; t = "c";"#;
        let (output, table) = run(source);

        assert_eq!(
            output,
            "__str0:\t.asciiz \"a\\\"b\"\n__str1:\t.asciiz \"c\"\n"
        );
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn escaped_backslash_before_quote() {
        let (output, _) = run(r#""a\\" "b""#);
        assert_eq!(
            output,
            "__str0:\t.asciiz \"a\\\\\"\n__str1:\t.asciiz \"b\"\n"
        );
    }

    #[test]
    fn unterminated_literal() {
        let source = "int x;\nchar *s = \"abc";
        let error = extract(source, &mut std::io::sink()).unwrap_err();

        assert!(matches!(error.val(), CompileError::UnterminatedString));
        assert_eq!(error.location().line(), 2);
        assert_eq!(error.location().column(), 10);
    }

    #[test]
    fn literal_bounds() {
        assert_eq!(literal_end("abc\" rest"), Some(3));
        assert_eq!(literal_end(r#"\"\"""#), Some(4));
        assert_eq!(literal_end("abc\\"), None);
    }
}
