//! Errores y diagnósticos.
//!
//! Todo error de compilación es irrecuperable: se reporta exactamente
//! uno, anclado a la posición del cursor al momento de detectarlo.
//! Las advertencias comparten el mismo formato pero nunca alteran el
//! flujo de control.

use crate::{
    source::{Located, Location},
    types::{Type, TypeError},
};

use std::{
    fmt::{self, Display},
    io,
};

use thiserror::Error;

/// Resultado de cualquier operación de compilación.
pub type Compile<T> = Result<T, Located<CompileError>>;

/// Error de compilación.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CompileError {
    /// Error de E/S al escribir código ensamblador.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Se esperaba un carácter específico en esta posición.
    #[error("Expected '{0}'")]
    Expected(char),

    #[error("Expected '{0}' or '{1}'")]
    ExpectedEither(char, char),

    #[error("Expected 'void', 'int', or 'char'")]
    ExpectedBaseType,

    #[error("Expected identifier name")]
    ExpectedIdentifier,

    #[error("Expected function name")]
    ExpectedFunctionName,

    #[error("Expected an expression")]
    ExpectedExpression,

    #[error("Expected ';' for return in void function")]
    VoidReturnValue,

    #[error("Expected closing '\"'")]
    UnterminatedString,

    #[error("Integer constant is out of range")]
    IntegerOverflow,

    #[error("Invalid type")]
    InvalidType,

    #[error("`{0}` is a reserved word")]
    ReservedWord(String),

    #[error("Unexpected identifier in type name")]
    NamedTypeName,

    /// Secuencia de tipo demasiado profunda.
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("Too many arguments!")]
    TooManyArguments,

    #[error("Duplicate definitions of non-function data")]
    DuplicateData,

    #[error("Duplicate definition of `{0}`")]
    DuplicateLocal(String),

    #[error("Incompatible function definitions")]
    IncompatibleDefinitions,

    #[error("Redefinition of function `{0}`")]
    Redefinition(String),

    #[error("Function cannot return function")]
    ReturnsFunction,

    #[error("Function cannot return list")]
    ReturnsList,

    /// Argumentos y locales exceden el marco direccionable.
    #[error("Function frame exceeds {0} bytes")]
    FrameTooLarge(u32),

    #[error("Parameter {0} of a function definition has no name")]
    UnnamedParameter(usize),

    #[error("Variable `{0}` declared void")]
    VoidVariable(String),

    #[error("Local function declarations are not supported")]
    LocalFunction,

    #[error("Lists cannot be initialized")]
    ListInitializer,

    #[error("Undefined identifier `{0}`")]
    Undefined(String),

    #[error("Expression is not assignable")]
    NotAssignable,

    #[error("Cannot take the address of this expression")]
    NotAddressable,

    #[error("Void value used in expression")]
    VoidValue,

    #[error("Type mismatch: `{0}` is not a pointer")]
    NotPointer(Type),

    #[error("Type mismatch: `{0}` is not callable")]
    NotCallable(Type),

    #[error("Invalid operands to '{0}': `{1}` and `{2}`")]
    InvalidOperands(&'static str, Type, Type),

    #[error("Incompatible types: cannot convert `{0}` to `{1}`")]
    IncompatibleTypes(Type, Type),

    #[error("Expected {expected} arguments, found {found}")]
    ArgumentCount { expected: usize, found: usize },
}

/// Advertencia de compilación.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CompileWarning {
    #[error("Identifier truncated to {0} characters")]
    TruncatedIdentifier(usize),

    #[error("Implicit conversion from `{0}` to `{1}`")]
    ImplicitConversion(Type, Type),
}

/// Severidad de un diagnóstico.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => fmt.write_str("Warning"),
            Severity::Error => fmt.write_str("Error"),
        }
    }
}

/// Un diagnóstico listo para imprimirse.
///
/// Se imprime la línea actual sin indentación, un `^` bajo la posición
/// del cursor y finalmente el mensaje.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    severity: Severity,
    location: Location,
    message: String,
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<Located<CompileError>> for Diagnostic {
    fn from(error: Located<CompileError>) -> Self {
        let (location, error) = error.split();
        Diagnostic {
            severity: Severity::Error,
            location,
            message: error.to_string(),
        }
    }
}

impl From<Located<CompileWarning>> for Diagnostic {
    fn from(warning: Located<CompileWarning>) -> Self {
        let (location, warning) = warning.split();
        Diagnostic {
            severity: Severity::Warning,
            location,
            message: warning.to_string(),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_known() {
            writeln!(fmt, "{}", self.location)?;
        }

        writeln!(fmt, "{}: {}", self.severity, self.message)
    }
}

impl From<io::Error> for Located<CompileError> {
    fn from(error: io::Error) -> Self {
        Located::at(CompileError::Io(error), Location::unknown())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Cursor;

    #[test]
    fn error_rendering() {
        let mut cursor = Cursor::new("int main(void) {\n\treturn 0\n}\n");
        while cursor.peek() != Some('\n') || cursor.line() < 2 {
            cursor.bump();
        }

        let error = Located::at(CompileError::Expected(';'), cursor.location());
        let diagnostic = Diagnostic::from(error);

        assert_eq!(diagnostic.severity(), Severity::Error);
        assert_eq!(
            diagnostic.to_string(),
            "Line 2:\nreturn 0\n        ^\nError: Expected ';'\n"
        );
    }

    #[test]
    fn unknown_location_omits_source() {
        let error = io::Error::new(io::ErrorKind::BrokenPipe, "closed");
        let diagnostic = Diagnostic::from(Located::<CompileError>::from(error));

        assert_eq!(diagnostic.to_string(), "Error: I/O error: closed\n");
    }
}
