//! Análisis sintáctico de declaradores.
//!
//! # Gramática
//! ```text
//! Type       := BaseKind Declarator
//! Declarator := '*'* ( Identifier | '(' Declarator ')' )? Suffix
//! Suffix     := '(' ( Type ( ',' Type )* )? ')'
//!             | ( '[' IntegerLiteral? ']' )*
//! ```
//!
//! Los declaradores de C se leen "de adentro hacia afuera": los sufijos
//! de función y de lista ligan más fuerte que los punteros, y los paréntesis
//! invierten esto. El parser construye el [`Type`] anteponiendo entradas a
//! un acumulador, de modo que al leerlo de frente hacia atrás la estructura
//! interna aparece primero.
//!
//! Como efecto secundario se capturan el identificador declarado y los
//! nombres de los argumentos del declarador de función más interno, que
//! es el que se aplica directamente al identificador.

use crate::{
    error::{Compile, CompileError, CompileWarning},
    source::{is_alpha, is_alphanumeric, Cursor, Located},
    types::{Entry, Type},
};

/// Palabras que nunca pueden ser identificadores.
pub const RESERVED: &[&str] = &["void", "int", "char", "if", "while", "return"];

/// Palabras clave de tipos base.
const BASE_TYPES: &[(&str, Entry)] = &[
    ("void", Entry::Void),
    ("int", Entry::Int),
    ("char", Entry::Char),
];

/// Límites de captura de nombres.
#[derive(Copy, Clone, Debug)]
pub struct Limits {
    /// Cantidad máxima de caracteres significativos en un identificador.
    pub identifier_length: usize,

    /// Cantidad máxima de argumentos con nombre en una declaración de función.
    pub max_arguments: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            identifier_length: 31,
            max_arguments: 32,
        }
    }
}

/// Resultado de analizar un tipo completo.
#[derive(Debug)]
pub struct Declaration {
    pub ty: Type,

    /// Identificador declarado, si lo hubo.
    pub name: Option<String>,

    /// Nombres de argumentos del declarador de función más interno.
    ///
    /// Hay una posición por argumento, `None` para argumentos sin nombre.
    pub arguments: Vec<Option<String>>,

    /// Advertencias que surgieron durante el análisis.
    pub warnings: Vec<Located<CompileWarning>>,
}

/// Analiza un tipo completo con su declarador.
pub fn parse_type(cursor: &mut Cursor<'_>, limits: &Limits) -> Compile<Declaration> {
    let mut parser = Parser {
        cursor,
        limits,
        warnings: Vec::new(),
    };

    let mut names = Names {
        capture_arguments: true,
        ..Default::default()
    };

    let ty = parser.full_type(&mut names)?;

    Ok(Declaration {
        ty,
        name: names.name,
        arguments: names.arguments.unwrap_or_default(),
        warnings: parser.warnings,
    })
}

/// Analiza un nombre de tipo abstracto, como el de una conversión explícita.
pub fn parse_type_name(cursor: &mut Cursor<'_>, limits: &Limits) -> Compile<Type> {
    let start = cursor.clone();
    let declaration = parse_type(cursor, limits)?;

    match declaration.name {
        None => Ok(declaration.ty),
        Some(_) => Err(Located::at(CompileError::NamedTypeName, start.location())),
    }
}

impl Cursor<'_> {
    /// Consume una palabra clave de tipo base.
    pub fn datatype(&mut self) -> Option<Entry> {
        BASE_TYPES
            .iter()
            .find(|(word, _)| self.eat_word(word))
            .map(|&(_, entry)| entry)
    }

    /// Determina, sin consumir, si a continuación inicia un tipo.
    pub fn at_datatype(&self) -> bool {
        self.clone().datatype().is_some()
    }
}

/// Nombres capturados por un declarador.
#[derive(Default)]
struct Names {
    name: Option<String>,
    arguments: Option<Vec<Option<String>>>,
    capture_arguments: bool,
}

struct Parser<'c, 'a> {
    cursor: &'c mut Cursor<'a>,
    limits: &'c Limits,
    warnings: Vec<Located<CompileWarning>>,
}

impl Parser<'_, '_> {
    fn full_type(&mut self, names: &mut Names) -> Compile<Type> {
        self.cursor.skip_whitespace();

        let mut ty = match self.cursor.datatype() {
            Some(base) => Type::of(base),
            None => return self.fail(CompileError::ExpectedBaseType),
        };

        self.cursor.skip_whitespace();
        self.declarator(&mut ty, names)?;

        Ok(ty)
    }

    fn declarator(&mut self, ty: &mut Type, names: &mut Names) -> Compile<()> {
        let mut inner = Type::empty();
        let mut lists = Type::empty();

        self.cursor.skip_whitespace();
        while self.cursor.eat('*') {
            self.push(ty, Entry::PointerTo)?;
            self.cursor.skip_whitespace();
        }

        if !self.identifier(names)? && self.cursor.eat('(') {
            self.declarator(&mut inner, names)?;
            self.cursor.skip_whitespace();
            self.expect(')')?;
        }

        self.cursor.skip_whitespace();
        if self.cursor.eat('(') {
            self.push(ty, Entry::FunctionEnd)?;
            self.arguments(ty, names)?;
            self.expect(')')?;
            self.push(ty, Entry::FunctionBegin)?;

            // Funciones que retornan funciones o listas sin paréntesis
            self.cursor.skip_whitespace();
            if matches!(self.cursor.peek(), Some('(' | '[')) {
                return self.fail(CompileError::InvalidType);
            }
        } else {
            let mut lengths = Vec::new();
            while self.cursor.eat('[') {
                self.cursor.skip_whitespace();

                // `[]` equivale a una lista de longitud 0
                let length = match self.cursor.integer() {
                    Some(Some(length)) => length,
                    Some(None) => return self.fail(CompileError::IntegerOverflow),
                    None => 0,
                };

                self.cursor.skip_whitespace();
                self.expect(']')?;
                self.cursor.skip_whitespace();

                lengths.push(length);
            }

            for length in lengths.into_iter().rev() {
                self.push(&mut lists, Entry::ListOf(length))?;
            }
        }

        self.splice(ty, lists)?;
        self.splice(ty, inner)
    }

    fn arguments(&mut self, ty: &mut Type, names: &mut Names) -> Compile<()> {
        self.cursor.skip_whitespace();
        if self.cursor.peek() == Some(')') {
            names.arguments.get_or_insert_with(Vec::new);
            return Ok(());
        }

        let capture = names.capture_arguments && names.arguments.is_none();

        let mut types = Vec::new();
        let mut captured = Vec::new();
        loop {
            let mut argument_names = Names::default();
            types.push(self.full_type(&mut argument_names)?);
            captured.push(argument_names.name);

            // `(void)` no cuenta como argumento
            let void_list = types.len() == 1 && types[0].is_void() && captured[0].is_none();
            if capture && !void_list && captured.len() > self.limits.max_arguments {
                return self.fail(CompileError::TooManyArguments);
            }

            self.cursor.skip_whitespace();
            if self.cursor.eat(',') {
                continue;
            } else if self.cursor.peek() == Some(')') {
                break;
            } else {
                return self.fail(CompileError::ExpectedEither(',', ')'));
            }
        }

        // El primer argumento debe quedar al frente
        for argument in types.into_iter().rev() {
            self.splice(ty, argument)?;
        }

        if capture {
            names.arguments = Some(captured);
        }

        Ok(())
    }

    fn identifier(&mut self, names: &mut Names) -> Compile<bool> {
        if !self.cursor.peek().map_or(false, is_alpha) {
            return Ok(false);
        }

        let start = self.cursor.clone();
        let rest = self.cursor.rest();
        let length = rest.find(|c| !is_alphanumeric(c)).unwrap_or(rest.len());
        let word = &rest[..length];

        if RESERVED.contains(&word) {
            return self.fail(CompileError::ReservedWord(word.to_owned()));
        }

        self.cursor.eat_str(word);

        let limit = self.limits.identifier_length;
        let name = if word.len() > limit {
            let warning = CompileWarning::TruncatedIdentifier(limit);
            self.warnings.push(Located::at(warning, start.location()));

            &word[..limit]
        } else {
            word
        };

        names.name = Some(name.to_owned());
        Ok(true)
    }

    fn push(&self, ty: &mut Type, entry: Entry) -> Compile<()> {
        ty.push_front(entry).or_else(|error| self.fail(error))
    }

    fn splice(&self, ty: &mut Type, front: Type) -> Compile<()> {
        ty.splice_front(front).or_else(|error| self.fail(error))
    }

    fn expect(&mut self, c: char) -> Compile<()> {
        if self.cursor.eat(c) {
            Ok(())
        } else {
            self.fail(CompileError::Expected(c))
        }
    }

    fn fail<T, E: Into<CompileError>>(&self, error: E) -> Compile<T> {
        Err(Located::at(error.into(), self.cursor.location()))
    }
}
