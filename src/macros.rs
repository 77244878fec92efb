/// Emite una instrucción al flujo de salida del contexto.
///
/// El opcode se alinea a 8 columnas, seguido por los operandos
/// con la misma sintaxis de `format!()`.
macro_rules! emit {
    ($context:expr, $opcode:expr) => {
        writeln!($context.output(), "\t{}", $opcode)
    };

    ($context:expr, $opcode:expr, $($format:tt)*) => {{
        write!($context.output(), "\t{:8}", $opcode)?;
        writeln!($context.output(), $($format)*)
    }};
}

/// Emite una directiva o etiqueta sin indentación.
macro_rules! directive {
    ($context:expr, $($format:tt)*) => {
        writeln!($context.output(), $($format)*)
    };
}
