//! Compilación de programas, funciones, bloques y sentencias.
//!
//! # Gramática
//! ```text
//! Program     := ( Type ( ';' | '{' Body '}' ) )*
//! Body        := ( Type ( '=' Expression )? ';' )* Statement*
//! Statement   := 'if' '(' Expression ')' Statement
//!              | 'while' '(' Expression ')' Statement
//!              | 'return' Expression? ';'
//!              | '{' Statement* '}'
//!              | Expression? ';'
//! ```

use super::{Compiler, Data, Frame};

use crate::{
    arch::Reg,
    error::{Compile, CompileError},
    parse::{parse_type, Declaration},
    semantic::{Storage, Variable},
    source::Cursor,
    strings::literal_end,
    types::{align4, Type, WORD_SIZE},
};

use log::{debug, info};

/// Local declarada al inicio del cuerpo de una función.
///
/// Las direcciones de las locales dependen del tamaño final del marco,
/// por lo cual el nombre se vincula y el inicializador se compila hasta
/// después del prólogo, en orden de declaración.
struct Local<'a> {
    name: String,
    position: u32,
    ty: Type,
    initializer: Option<Cursor<'a>>,
}

impl<'a> Compiler<'a, '_> {
    /// Compila todas las declaraciones de nivel superior.
    pub fn program(&mut self) -> Compile<()> {
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.is_eof() {
                return Ok(());
            }

            self.declaration()?;
            self.scopes.local.clear();
        }
    }

    fn declaration(&mut self) -> Compile<()> {
        let Declaration {
            ty,
            name,
            arguments,
            warnings,
        } = parse_type(&mut self.cursor, &self.limits)?;

        for warning in warnings {
            self.report(warning)?;
        }

        let name = match name {
            Some(name) => name,
            None if ty.is_function() => return self.fail(CompileError::ExpectedFunctionName),
            None => return self.fail(CompileError::ExpectedIdentifier),
        };

        self.cursor.skip_whitespace();
        if ty.is_function() {
            self.function(name, ty, &arguments)
        } else {
            self.global(name, ty)
        }
    }

    fn global(&mut self, name: String, ty: Type) -> Compile<()> {
        if ty.is_void() {
            return self.fail(CompileError::VoidVariable(name));
        }

        let size = align4(ty.byte_size());
        let variable = Variable {
            ty,
            storage: Storage::Global,
        };

        if self.scopes.global.define(name.clone(), variable).is_err() {
            return self.fail(CompileError::DuplicateData);
        }

        self.expect(';')?;
        directive!(self, ".data\n.align 2\n{}:\n.space {}\n.text", name, size)?;

        Ok(())
    }

    fn function(&mut self, name: String, ty: Type, arguments: &[Option<String>]) -> Compile<()> {
        let (parameters, return_type) = match ty.signature() {
            Some(signature) => signature,
            None => return self.fail(CompileError::InvalidType),
        };

        if return_type.is_function() {
            return self.fail(CompileError::ReturnsFunction);
        } else if return_type.is_list() {
            return self.fail(CompileError::ReturnsList);
        }

        let defined = match self.scopes.global.lookup(&name) {
            None => false,
            Some(Variable {
                ty: previous,
                storage: Storage::Callable { defined },
            }) if *previous == ty => *defined,

            Some(_) => return self.fail(CompileError::IncompatibleDefinitions),
        };

        self.scopes.global.insert(
            name.clone(),
            Variable {
                ty: ty.clone(),
                storage: Storage::Callable { defined },
            },
        );

        if self.cursor.eat(';') {
            debug!("prototype for `{}`: {}", name, ty);
            return Ok(());
        } else if !self.cursor.eat('{') {
            return self.fail(CompileError::ExpectedEither('{', ';'));
        } else if defined {
            return self.fail(CompileError::Redefinition(name));
        }

        if let Some(variable) = self.scopes.global.lookup_mut(&name) {
            variable.storage = Storage::Callable { defined: true };
        }

        self.frame = Frame {
            size: 0,
            return_type,
        };

        self.regs.reset();
        self.scopes.local.clear();

        directive!(self, "\n.globl {0}\n{0}:", name)?;
        self.bind_parameters(&parameters, arguments)?;

        self.block(true)?;
        self.expect('}')?;
        self.epilogue()?;

        info!(
            "compiled `{}`: {} parameters, frame size {}",
            name,
            parameters.len(),
            self.frame.size
        );

        Ok(())
    }

    /// Asocia cada argumento de la firma con su nombre en la definición.
    ///
    /// Los nombres provienen del mismo sufijo de función que la firma,
    /// así que hay exactamente uno por argumento, salvo `(void)`: este
    /// captura un único nombre y ningún argumento.
    fn bind_parameters(&mut self, parameters: &[Type], names: &[Option<String>]) -> Compile<()> {
        if let ([], [Some(name)]) = (parameters, names) {
            return self.fail(CompileError::VoidVariable(name.clone()));
        }

        for (index, (parameter, name)) in parameters.iter().zip(names).enumerate() {
            let name = match name {
                Some(name) => name.clone(),
                None => return self.fail(CompileError::UnnamedParameter(index + 1)),
            };

            if parameter.is_void() {
                return self.fail(CompileError::VoidVariable(name));
            }

            let ty = parameter.decay().or_else(|error| self.fail(error))?;
            if self.scopes.local.lookup(&name).is_some() {
                return self.fail(CompileError::DuplicateLocal(name));
            }

            let position = self.grow_frame(WORD_SIZE)?;
            let variable = Variable {
                ty,
                storage: Storage::Local { position },
            };

            self.scopes.local.insert(name, variable);
        }

        Ok(())
    }

    /// Compila un bloque hasta, sin incluir, su `}`.
    ///
    /// El cuerpo de una función admite declaraciones al inicio. Hasta
    /// haberlas visto todas se conoce el tamaño del marco, así que el
    /// prólogo se emite justo después.
    fn block(&mut self, declarations: bool) -> Compile<()> {
        if declarations {
            let mut locals = Vec::new();

            self.cursor.skip_whitespace();
            while self.cursor.at_datatype() {
                let local = self.local(&locals)?;
                locals.push(local);
                self.cursor.skip_whitespace();
            }

            self.prologue()?;

            let resume = self.cursor.clone();
            for local in locals {
                self.bind_local(local)?;
            }

            self.cursor = resume;
        }

        loop {
            self.cursor.skip_whitespace();
            match self.cursor.peek() {
                Some('}') => return Ok(()),
                None => return self.fail(CompileError::Expected('}')),
                Some(_) => {
                    self.statement()?;
                    debug_assert!(self.regs.is_empty());
                }
            }
        }
    }

    /// Declara una variable local sin vincular aún su nombre.
    fn local(&mut self, declared: &[Local<'a>]) -> Compile<Local<'a>> {
        let Declaration {
            ty, name, warnings, ..
        } = parse_type(&mut self.cursor, &self.limits)?;

        for warning in warnings {
            self.report(warning)?;
        }

        let name = match name {
            Some(name) => name,
            None => return self.fail(CompileError::ExpectedIdentifier),
        };

        if ty.is_function() {
            return self.fail(CompileError::LocalFunction);
        } else if ty.is_void() {
            return self.fail(CompileError::VoidVariable(name));
        }

        let duplicate = self.scopes.local.lookup(&name).is_some()
            || declared.iter().any(|local| local.name == name);

        if duplicate {
            return self.fail(CompileError::DuplicateLocal(name));
        }

        let position = self.grow_frame(align4(ty.byte_size()))?;

        self.cursor.skip_whitespace();
        let initializer = if self.cursor.peek() == Some('=') {
            if ty.is_list() {
                return self.fail(CompileError::ListInitializer);
            }

            self.cursor.bump();
            let cursor = self.cursor.clone();
            self.skip_initializer()?;

            Some(cursor)
        } else {
            None
        };

        self.expect(';')?;

        Ok(Local {
            name,
            position,
            ty,
            initializer,
        })
    }

    /// Avanza hasta el `;` que termina un inicializador.
    fn skip_initializer(&mut self) -> Compile<()> {
        let mut depth = 0usize;

        loop {
            match self.cursor.peek() {
                None => return self.fail(CompileError::Expected(';')),
                Some(';') if depth == 0 => return Ok(()),
                Some('(' | '[') => depth += 1,
                Some(')' | ']') => depth = depth.saturating_sub(1),
                Some('"') => {
                    self.cursor.bump();

                    let rest = self.cursor.rest();
                    let body = &rest[..literal_end(rest).unwrap_or(rest.len())];
                    self.cursor.eat_str(body);
                }

                Some(_) => (),
            }

            self.cursor.bump();
        }
    }

    /// Vincula una local y compila su inicializador, si lo tiene.
    fn bind_local(&mut self, local: Local<'a>) -> Compile<()> {
        let Local {
            name,
            position,
            ty,
            initializer,
        } = local;

        let variable = Variable {
            ty: ty.clone(),
            storage: Storage::Local { position },
        };

        // Los duplicados ya se rechazaron durante la declaración
        self.scopes.local.insert(name, variable);

        let cursor = match initializer {
            Some(cursor) => cursor,
            None => return Ok(()),
        };

        self.cursor = cursor;

        let value = self.expression()?;
        let value = self.cast(value, &ty, false)?;
        self.store_local(position, &ty, value.data)?;
        self.regs.deallocate(value.data);

        self.cursor.skip_whitespace();
        if self.cursor.peek() != Some(';') {
            return self.fail(CompileError::Expected(';'));
        }

        Ok(())
    }

    fn statement(&mut self) -> Compile<()> {
        self.cursor.skip_whitespace();

        if self.cursor.eat_word("if") {
            self.expect('(')?;

            let condition = self.condition()?;
            let end = self.new_label();
            self.branch_if_false(condition, end)?;
            self.regs.deallocate(condition);

            self.expect(')')?;
            self.statement()?;
            self.place_label(end)
        } else if self.cursor.eat_word("while") {
            self.expect('(')?;

            let (top, end) = (self.new_label(), self.new_label());
            self.place_label(top)?;

            let condition = self.condition()?;
            self.branch_if_false(condition, end)?;
            self.regs.deallocate(condition);

            self.expect(')')?;
            self.statement()?;

            emit!(self, "j", "__L{}", top)?;
            self.place_label(end)
        } else if self.cursor.eat_word("return") {
            self.return_statement()
        } else if self.cursor.eat('{') {
            self.block(false)?;
            self.expect('}')
        } else if self.cursor.eat(';') {
            Ok(())
        } else {
            let value = self.expression()?;
            self.regs.deallocate(value.data);
            self.expect(';')
        }
    }

    /// Compila la condición de un `if` o `while`.
    fn condition(&mut self) -> Compile<Data> {
        let value = self.expression()?;
        if value.ty.is_void() {
            return self.fail(CompileError::VoidValue);
        }

        Ok(value.data)
    }

    fn return_statement(&mut self) -> Compile<()> {
        self.cursor.skip_whitespace();

        if self.frame.return_type.is_void() {
            if !self.cursor.eat(';') {
                return self.fail(CompileError::VoidReturnValue);
            }
        } else {
            let return_type = self.frame.return_type.clone();
            let value = self.expression()?;
            let value = self.cast(value, &return_type, true)?;

            let reg = self.load(value.data, Reg::T0)?;
            let slot = self.return_slot()?;
            emit!(self, "sw", "{}, {}($sp)", reg, slot)?;
            self.regs.deallocate(value.data);

            self.expect(';')?;
        }

        self.epilogue()
    }
}
