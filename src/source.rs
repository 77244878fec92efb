//! Rastreo de ubicaciones originales en código fuente.
//!
//! El compilador opera en una sola pasada sobre el texto fuente,
//! por lo cual no existe un flujo de tokens. En su lugar, todas las
//! fases comparten un [`Cursor`] que avanza carácter por carácter.
//! El cursor es además el único punto donde se determina la
//! "posición actual" a la que se anclan los diagnósticos.

use std::fmt::{self, Display, Formatter};

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }
}

/// Una ubicación: línea, texto recortado de la línea y columna del cursor.
///
/// La columna se cuenta en caracteres a partir del inicio recortado
/// de la línea, que es exactamente la cantidad de espacios que preceden
/// al `^` en un diagnóstico. La línea 0 indica una ubicación desconocida.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    line: u32,
    text: String,
    column: usize,
}

impl Location {
    /// Ubicación para errores que no se originan en el código fuente.
    pub fn unknown() -> Self {
        Location::default()
    }

    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el texto de la línea, sin espacios iniciales.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Obtiene la columna del cursor relativa a [`Location::text()`].
    pub fn column(&self) -> usize {
        self.column
    }

    /// Determina si la ubicación corresponde a algún punto del código fuente.
    pub fn is_known(&self) -> bool {
        self.line > 0
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        writeln!(formatter, "Line {}:", self.line)?;
        writeln!(formatter, "{}", self.text)?;
        write!(formatter, "{:column$}^", "", column = self.column)
    }
}

/// Posición de lectura sobre el programa completo.
///
/// Clonar un cursor es barato y equivale a tomar un punto de
/// restauración, lo cual se aprovecha para lookahead.
#[derive(Clone)]
pub struct Cursor<'a> {
    source: &'a str,
    offset: usize,
    line: u32,
}

impl<'a> Cursor<'a> {
    /// Crea un cursor al inicio del texto.
    pub fn new(source: &'a str) -> Self {
        Cursor {
            source,
            offset: 0,
            line: 1,
        }
    }

    /// Texto fuente completo.
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Desplazamiento en bytes desde el inicio.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Número de línea actual, a partir de 1.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Texto restante a partir del cursor.
    pub fn rest(&self) -> &'a str {
        &self.source[self.offset..]
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.source.len()
    }

    /// Observa el siguiente carácter sin consumirlo.
    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Observa el carácter `n` posiciones adelante.
    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    /// Consume un carácter.
    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }

        Some(c)
    }

    /// Consume `c` si es el siguiente carácter.
    pub fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume una secuencia literal de caracteres si aparece a continuación.
    pub fn eat_str(&mut self, text: &str) -> bool {
        if self.rest().starts_with(text) {
            for _ in text.chars() {
                self.bump();
            }

            true
        } else {
            false
        }
    }

    /// Determina si sigue la palabra `word` completa, es decir, sin
    /// que la siga otro carácter alfanumérico.
    pub fn at_word(&self, word: &str) -> bool {
        let rest = self.rest();
        rest.starts_with(word)
            && !rest[word.len()..]
                .chars()
                .next()
                .map_or(false, is_alphanumeric)
    }

    /// Consume la palabra `word` si sigue completa.
    pub fn eat_word(&mut self, word: &str) -> bool {
        if self.at_word(word) {
            self.eat_str(word)
        } else {
            false
        }
    }

    /// Descarta espacios en blanco.
    pub fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.bump();
        }
    }

    /// Consume una constante entera decimal no negativa.
    ///
    /// Retorna `None` si no sigue un dígito y `Some(None)` si
    /// la constante no cabe en 32 bits.
    pub fn integer(&mut self) -> Option<Option<u32>> {
        if !self.peek().map_or(false, |c| c.is_ascii_digit()) {
            return None;
        }

        let mut value = Some(0u32);
        while let Some(digit) = self.peek().and_then(|c| c.to_digit(10)) {
            value = value
                .and_then(|n| n.checked_mul(10))
                .and_then(|n| n.checked_add(digit));

            self.bump();
        }

        Some(value)
    }

    /// Determina la ubicación actual para efectos de diagnóstico.
    ///
    /// Se retrocede hasta el inicio de la línea, se descartan espacios
    /// iniciales (sin sobrepasar al cursor) y la columna resultante es
    /// la cantidad de caracteres entre ese inicio y el cursor.
    pub fn location(&self) -> Location {
        let offset = self.offset.min(self.source.len());
        let line_start = self.source[..offset].rfind('\n').map_or(0, |i| i + 1);

        let indent = self.source[line_start..offset]
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(offset - line_start);

        let start = line_start + indent;
        let end = self.source[start..]
            .find('\n')
            .map_or(self.source.len(), |i| start + i);

        Location {
            line: self.line,
            text: self.source[start..end].trim_end_matches('\r').to_owned(),
            column: self.source[start..offset].chars().count(),
        }
    }
}

/// Determina si un carácter puede iniciar un identificador.
pub fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Determina si un carácter puede pertenecer a un identificador.
pub fn is_alphanumeric(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
