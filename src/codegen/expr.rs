//! Compilación de expresiones.
//!
//! # Gramática
//! De menor a mayor precedencia:
//! ```text
//! Assignment := Binary ( '=' Assignment )?
//! Binary     := || , && , == != , < > <= >= , + - , * / %
//! Unary      := ( '-' | '!' | '*' | '&' | '(' Type ')' ) Unary | Postfix
//! Postfix    := Primary ( '[' Expression ']' | '(' Arguments ')' )*
//! Primary    := Integer | String | Identifier | '(' Assignment ')'
//! ```
//!
//! Un operando se mantiene como [`Place`] mientras sea posible usarlo
//! como destino de asignación u operando de `&`. Solo al necesitarse
//! su valor se materializa en almacenamiento del asignador.

use super::{Compiler, Data, Value};

use crate::{
    arch::Reg,
    error::{Compile, CompileError, CompileWarning},
    parse::{parse_type_name, RESERVED},
    semantic::Storage,
    source::{is_alpha, is_alphanumeric},
    strings::literal_end,
    types::Type,
};

/// Objeto designado por una expresión.
#[derive(Clone, Debug)]
enum Place {
    /// Datos o función bajo una etiqueta global.
    Global(String),

    /// Local en `offset($sp)`.
    Frame(u32),

    /// Dirección contenida en un valor intermedio.
    Indirect(Data),
}

/// Resultado parcial de una expresión.
enum Operand {
    Value(Value),
    Place(Type, Place),
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Op {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Or => "||",
            Op::And => "&&",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Le => "<=",
            Op::Ge => ">=",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Rem => "%",
        }
    }
}

/// Operadores binarios por nivel de precedencia, de menor a mayor.
const LEVELS: &[&[Op]] = &[
    &[Op::Or],
    &[Op::And],
    &[Op::Eq, Op::Ne],
    &[Op::Le, Op::Ge, Op::Lt, Op::Gt],
    &[Op::Add, Op::Sub],
    &[Op::Mul, Op::Div, Op::Rem],
];

impl Compiler<'_, '_> {
    /// Compila una expresión completa y obtiene su valor.
    pub(super) fn expression(&mut self) -> Compile<Value> {
        let operand = self.assignment()?;
        self.rvalue(operand)
    }

    /// Adapta un valor a otro tipo.
    ///
    /// Las conversiones implícitas entre enteros y punteros se permiten
    /// con una advertencia.
    pub(super) fn cast(&mut self, value: Value, target: &Type, explicit: bool) -> Compile<Value> {
        let source = &value.ty;
        if source == target {
            return Ok(value);
        } else if target.is_void() && explicit {
            return Ok(Value {
                ty: Type::void(),
                data: value.data,
            });
        } else if source.is_void() {
            return self.fail(CompileError::VoidValue);
        }

        let compatible = if source.is_integer() && target.is_integer() {
            true
        } else if source.is_pointer() && target.is_pointer() {
            let (from, to) = (source.rest(), target.rest());
            explicit || from == to || from.is_void() || to.is_void()
        } else if source.is_integer() && target.is_pointer()
            || source.is_pointer() && target.is_integer()
        {
            if !explicit {
                self.warn(CompileWarning::ImplicitConversion(
                    source.clone(),
                    target.clone(),
                ))?;
            }

            true
        } else {
            false
        };

        if !compatible {
            let error = CompileError::IncompatibleTypes(source.clone(), target.clone());
            return self.fail(error);
        }

        if target.is_char() && !source.is_char() {
            let reg = self.load(value.data, Reg::T0)?;
            let target = Self::target(value.data, Reg::T0);
            emit!(self, "andi", "{}, {}, 0xFF", target, reg)?;
            self.commit(target, value.data)?;
        }

        Ok(Value {
            ty: target.clone(),
            data: value.data,
        })
    }

    fn assignment(&mut self) -> Compile<Operand> {
        let target = self.binary(0)?;

        self.cursor.skip_whitespace();
        if self.cursor.peek() != Some('=') || self.cursor.peek_nth(1) == Some('=') {
            return Ok(target);
        }

        let (ty, place) = match target {
            Operand::Place(ty, place) if !ty.is_list() && !ty.is_function() => (ty, place),
            _ => return self.fail(CompileError::NotAssignable),
        };

        self.cursor.bump();

        let value = self.assignment()?;
        let value = self.rvalue(value)?;
        let value = self.cast(value, &ty, false)?;

        self.store(place, value.data, &ty)?;
        Ok(Operand::Value(value))
    }

    fn binary(&mut self, level: usize) -> Compile<Operand> {
        let operators = match LEVELS.get(level) {
            Some(operators) => *operators,
            None => return self.unary(),
        };

        let mut lhs = self.binary(level + 1)?;
        loop {
            self.cursor.skip_whitespace();

            let op = operators
                .iter()
                .copied()
                .find(|op| self.cursor.rest().starts_with(op.symbol()));

            let op = match op {
                Some(op) => op,
                None => return Ok(lhs),
            };

            self.cursor.eat_str(op.symbol());
            let left = self.rvalue(lhs)?;

            let value = match op {
                Op::And | Op::Or => self.short_circuit(op, left, level)?,
                _ => {
                    let right = self.binary(level + 1)?;
                    let right = self.rvalue(right)?;
                    self.arithmetic(op, left, right)?
                }
            };

            lhs = Operand::Value(value);
        }
    }

    fn short_circuit(&mut self, op: Op, left: Value, level: usize) -> Compile<Value> {
        self.require_value(&left)?;

        let end = self.new_label();
        let data = left.data;

        let reg = self.load(data, Reg::T0)?;
        let target = Self::target(data, Reg::T0);
        emit!(self, "sltu", "{}, $zero, {}", target, reg)?;
        self.commit(target, data)?;

        let branch = if op == Op::And { "beq" } else { "bne" };
        emit!(self, branch, "{}, $zero, __L{}", target, end)?;

        let right = self.binary(level + 1)?;
        let right = self.rvalue(right)?;
        self.require_value(&right)?;

        let reg = self.load(right.data, Reg::T1)?;
        emit!(self, "sltu", "$t1, $zero, {}", reg)?;
        self.commit(Reg::T1, data)?;
        self.regs.deallocate(right.data);

        self.place_label(end)?;
        Ok(Value {
            ty: Type::int(),
            data,
        })
    }

    fn arithmetic(&mut self, op: Op, lhs: Value, rhs: Value) -> Compile<Value> {
        self.require_value(&lhs)?;
        self.require_value(&rhs)?;

        let (left, right) = (lhs.ty.pointee(), rhs.ty.pointee());
        let integers = lhs.ty.is_integer() && rhs.ty.is_integer();

        match op {
            Op::Add => match (left, right) {
                (Some(pointee), None) => return self.offset_pointer(lhs, rhs, &pointee, "add"),
                (None, Some(pointee)) => return self.offset_pointer(rhs, lhs, &pointee, "add"),
                _ if integers => return self.integer_op(lhs, rhs, "add"),
                _ => (),
            },

            Op::Sub => match (left, right) {
                (Some(pointee), None) => return self.offset_pointer(lhs, rhs, &pointee, "sub"),
                (Some(from), Some(to)) if from == to && !from.is_function() => {
                    let size = from.byte_size().max(1);
                    let data = self.combine(lhs.data, rhs.data, |this, target, a, b| {
                        emit!(this, "sub", "{}, {}, {}", target, a, b)?;
                        if size > 1 {
                            emit!(this, "li", "$t2, {}", size)?;
                            emit!(this, "div", "{}, $t2", target)?;
                            emit!(this, "mflo", "{}", target)?;
                        }

                        Ok(())
                    })?;

                    return Ok(Value {
                        ty: Type::int(),
                        data,
                    });
                }

                _ if integers => return self.integer_op(lhs, rhs, "sub"),
                _ => (),
            },

            Op::Mul if integers => return self.integer_op(lhs, rhs, "mul"),
            Op::Div | Op::Rem if integers => {
                let result = if op == Op::Div { "mflo" } else { "mfhi" };
                let data = self.combine(lhs.data, rhs.data, |this, target, a, b| {
                    emit!(this, "div", "{}, {}", a, b)?;
                    emit!(this, result, "{}", target)?;
                    Ok(())
                })?;

                return Ok(Value {
                    ty: Type::int(),
                    data,
                });
            }

            Op::Eq | Op::Ne | Op::Lt | Op::Gt | Op::Le | Op::Ge => {
                return self.comparison(op, lhs, rhs);
            }

            _ => (),
        }

        let error = CompileError::InvalidOperands(op.symbol(), lhs.ty, rhs.ty);
        self.fail(error)
    }

    fn integer_op(&mut self, lhs: Value, rhs: Value, opcode: &str) -> Compile<Value> {
        let data = self.combine(lhs.data, rhs.data, |this, target, a, b| {
            emit!(this, opcode, "{}, {}, {}", target, a, b)?;
            Ok(())
        })?;

        Ok(Value {
            ty: Type::int(),
            data,
        })
    }

    fn comparison(&mut self, op: Op, lhs: Value, rhs: Value) -> Compile<Value> {
        let less = if lhs.ty.is_pointer() || rhs.ty.is_pointer() {
            "sltu"
        } else {
            "slt"
        };

        let data = self.combine(lhs.data, rhs.data, |this, target, a, b| {
            match op {
                Op::Lt => emit!(this, less, "{}, {}, {}", target, a, b)?,
                Op::Gt => emit!(this, less, "{}, {}, {}", target, b, a)?,
                Op::Le => {
                    emit!(this, less, "{}, {}, {}", target, b, a)?;
                    emit!(this, "xori", "{0}, {0}, 1", target)?;
                }

                Op::Ge => {
                    emit!(this, less, "{}, {}, {}", target, a, b)?;
                    emit!(this, "xori", "{0}, {0}, 1", target)?;
                }

                Op::Eq => {
                    emit!(this, "xor", "{}, {}, {}", target, a, b)?;
                    emit!(this, "sltiu", "{0}, {0}, 1", target)?;
                }

                _ => {
                    emit!(this, "xor", "{}, {}, {}", target, a, b)?;
                    emit!(this, "sltu", "{0}, $zero, {0}", target)?;
                }
            }

            Ok(())
        })?;

        Ok(Value {
            ty: Type::int(),
            data,
        })
    }

    /// Desplaza un puntero por un índice escalado al tamaño del objeto apuntado.
    fn offset_pointer(
        &mut self,
        pointer: Value,
        index: Value,
        pointee: &Type,
        opcode: &str,
    ) -> Compile<Value> {
        if !index.ty.is_integer() || pointee.is_function() {
            let error = CompileError::InvalidOperands("+", pointer.ty, index.ty);
            return self.fail(error);
        }

        // Aritmética sobre `void *` avanza de byte en byte
        let size = pointee.byte_size().max(1);
        let data = self.combine(pointer.data, index.data, |this, target, a, b| {
            let b = if size > 1 {
                emit!(this, "li", "$t2, {}", size)?;
                emit!(this, "mul", "$t1, {}, $t2", b)?;
                Reg::T1
            } else {
                b
            };

            emit!(this, opcode, "{}, {}, {}", target, a, b)?;
            Ok(())
        })?;

        Ok(Value {
            ty: pointer.ty,
            data,
        })
    }

    /// Combina dos valores en el almacenamiento del primero y libera el segundo.
    fn combine<F>(&mut self, lhs: Data, rhs: Data, operation: F) -> Compile<Data>
    where
        F: FnOnce(&mut Self, Reg, Reg, Reg) -> Compile<()>,
    {
        let a = self.load(lhs, Reg::T0)?;
        let b = self.load(rhs, Reg::T1)?;
        let target = Self::target(lhs, Reg::T0);

        operation(self, target, a, b)?;
        self.commit(target, lhs)?;
        self.regs.deallocate(rhs);

        Ok(lhs)
    }

    fn unary(&mut self) -> Compile<Operand> {
        self.cursor.skip_whitespace();

        match self.cursor.peek() {
            Some('-') => {
                self.cursor.bump();

                let operand = self.unary()?;
                let value = self.rvalue(operand)?;
                if !value.ty.is_integer() {
                    let error = CompileError::InvalidOperands("-", Type::int(), value.ty);
                    return self.fail(error);
                }

                let reg = self.load(value.data, Reg::T0)?;
                let target = Self::target(value.data, Reg::T0);
                emit!(self, "sub", "{}, $zero, {}", target, reg)?;
                self.commit(target, value.data)?;

                Ok(Operand::Value(Value {
                    ty: Type::int(),
                    data: value.data,
                }))
            }

            Some('!') => {
                self.cursor.bump();

                let operand = self.unary()?;
                let value = self.rvalue(operand)?;
                self.require_value(&value)?;

                let reg = self.load(value.data, Reg::T0)?;
                let target = Self::target(value.data, Reg::T0);
                emit!(self, "sltiu", "{}, {}, 1", target, reg)?;
                self.commit(target, value.data)?;

                Ok(Operand::Value(Value {
                    ty: Type::int(),
                    data: value.data,
                }))
            }

            Some('*') => {
                self.cursor.bump();

                let operand = self.unary()?;
                let value = self.rvalue(operand)?;
                match value.ty.pointee() {
                    Some(pointee) => Ok(Operand::Place(pointee, Place::Indirect(value.data))),
                    None => self.fail(CompileError::NotPointer(value.ty)),
                }
            }

            Some('&') => {
                self.cursor.bump();

                match self.unary()? {
                    Operand::Place(ty, place) => {
                        let ty = self.pointer_to(ty)?;
                        let data = self.address(place)?;

                        Ok(Operand::Value(Value { ty, data }))
                    }

                    Operand::Value(_) => self.fail(CompileError::NotAddressable),
                }
            }

            Some('(') if self.cast_ahead() => {
                self.cursor.bump();

                let ty = parse_type_name(&mut self.cursor, &self.limits)?;
                self.expect(')')?;

                let operand = self.unary()?;
                let value = self.rvalue(operand)?;
                self.cast(value, &ty, true).map(Operand::Value)
            }

            _ => self.postfix(),
        }
    }

    /// Determina si a continuación hay una conversión explícita.
    fn cast_ahead(&self) -> bool {
        let mut lookahead = self.cursor.clone();
        lookahead.eat('(');
        lookahead.skip_whitespace();

        lookahead.at_datatype()
    }

    fn postfix(&mut self) -> Compile<Operand> {
        let mut operand = self.primary()?;

        loop {
            self.cursor.skip_whitespace();

            if self.cursor.eat('[') {
                let base = self.rvalue(operand)?;
                let pointee = match base.ty.pointee() {
                    Some(pointee) => pointee,
                    None => return self.fail(CompileError::NotPointer(base.ty)),
                };

                let index = self.expression()?;
                self.expect(']')?;

                let address = self.offset_pointer(base, index, &pointee, "add")?;
                operand = Operand::Place(pointee, Place::Indirect(address.data));
            } else if self.cursor.eat('(') {
                operand = Operand::Value(self.call(operand)?);
            } else {
                return Ok(operand);
            }
        }
    }

    fn primary(&mut self) -> Compile<Operand> {
        self.cursor.skip_whitespace();

        match self.cursor.peek() {
            Some(c) if c.is_ascii_digit() => {
                let value = match self.cursor.integer() {
                    Some(Some(value)) => value,
                    _ => return self.fail(CompileError::IntegerOverflow),
                };

                let data = self.regs.allocate();
                let target = Self::target(data, Reg::T0);
                emit!(self, "li", "{}, {}", target, value as i32)?;
                self.commit(target, data)?;

                Ok(Operand::Value(Value {
                    ty: Type::int(),
                    data,
                }))
            }

            Some('"') => self.string().map(Operand::Value),

            Some('(') => {
                self.cursor.bump();

                let operand = self.assignment()?;
                self.expect(')')?;

                Ok(operand)
            }

            Some(c) if is_alpha(c) => self.identifier(),

            _ => self.fail(CompileError::ExpectedExpression),
        }
    }

    fn string(&mut self) -> Compile<Value> {
        let label = match self.strings.label(self.cursor.offset()) {
            Some(label) => label,
            None => return self.fail(CompileError::UnterminatedString),
        };

        self.cursor.bump();
        let rest = self.cursor.rest();
        let body = &rest[..literal_end(rest).unwrap_or(rest.len())];

        self.cursor.eat_str(body);
        self.cursor.eat('"');

        let data = self.regs.allocate();
        let target = Self::target(data, Reg::T0);
        emit!(self, "la", "{}, __str{}", target, label)?;
        self.commit(target, data)?;

        let ty = self.pointer_to(Type::char())?;
        Ok(Value { ty, data })
    }

    fn identifier(&mut self) -> Compile<Operand> {
        let rest = self.cursor.rest();
        let length = rest.find(|c| !is_alphanumeric(c)).unwrap_or(rest.len());
        let word = &rest[..length];

        if RESERVED.contains(&word) {
            return self.fail(CompileError::ExpectedExpression);
        }

        let name = &word[..length.min(self.limits.identifier_length)];
        let variable = match self.scopes.lookup(name) {
            Some(variable) => variable.clone(),
            None => return self.fail(CompileError::Undefined(name.to_owned())),
        };

        self.cursor.eat_str(word);

        let place = match variable.storage {
            Storage::Global | Storage::Callable { .. } => Place::Global(name.to_owned()),
            Storage::Local { position } => Place::Frame(self.frame_offset(position, &variable.ty)?),
        };

        Ok(Operand::Place(variable.ty, place))
    }

    fn call(&mut self, callee: Operand) -> Compile<Value> {
        let (function, direct, pointer) = match callee {
            Operand::Place(ty, Place::Global(name)) if ty.is_function() => (ty, Some(name), None),
            callee => {
                let value = self.rvalue(callee)?;
                match value.ty.pointee() {
                    Some(function) if function.is_function() => (function, None, Some(value.data)),
                    _ => return self.fail(CompileError::NotCallable(value.ty)),
                }
            }
        };

        let (parameters, returns) = match function.signature() {
            Some(signature) => signature,
            None => return self.fail(CompileError::NotCallable(function)),
        };

        let mut arguments = Vec::new();
        self.cursor.skip_whitespace();
        if !self.cursor.eat(')') {
            loop {
                let argument = self.assignment()?;
                let argument = self.rvalue(argument)?;

                let argument = match parameters.get(arguments.len()) {
                    Some(parameter) => {
                        let parameter = parameter.decay().or_else(|error| self.fail(error))?;
                        self.cast(argument, &parameter, false)?
                    }

                    None => argument,
                };

                arguments.push(argument.data);

                self.cursor.skip_whitespace();
                if self.cursor.eat(')') {
                    break;
                } else if !self.cursor.eat(',') {
                    return self.fail(CompileError::ExpectedEither(',', ')'));
                }
            }
        }

        if arguments.len() != parameters.len() {
            return self.fail(CompileError::ArgumentCount {
                expected: parameters.len(),
                found: arguments.len(),
            });
        }

        // Registros vivos que no se consumen en la llamada
        let saved: Vec<Reg> = self
            .regs
            .live_registers()
            .filter(|&reg| {
                let data = Data::Register(reg);
                !arguments.contains(&data) && pointer != Some(data)
            })
            .collect();

        let depth = self.regs.depth();
        for (index, reg) in saved.iter().enumerate() {
            emit!(self, "sw", "{}, -{}($sp)", reg, depth + 4 + 4 * index as u32)?;
        }

        let frame = depth + 4 * saved.len() as u32 + 4;
        for (index, &argument) in arguments.iter().enumerate() {
            let reg = self.load(argument, Reg::T0)?;
            emit!(self, "sw", "{}, -{}($sp)", reg, frame + 8 + 4 * index as u32)?;
        }

        if let Some(pointer) = pointer {
            let reg = self.load(pointer, Reg::T2)?;
            if reg != Reg::T2 {
                emit!(self, "move", "$t2, {}", reg)?;
            }
        }

        let resume = self.new_label();
        emit!(self, "addi", "$sp, $sp, -{}", frame)?;
        emit!(self, "la", "$t0, __L{}", resume)?;
        emit!(self, "sw", "$t0, 0($sp)")?;

        match &direct {
            Some(name) => emit!(self, "j", "{}", name)?,
            None => emit!(self, "jr", "$t2")?,
        }

        self.place_label(resume)?;
        emit!(self, "lw", "$t0, -4($sp)")?;
        emit!(self, "addi", "$sp, $sp, {}", frame)?;

        for (index, reg) in saved.iter().enumerate() {
            emit!(self, "lw", "{}, -{}($sp)", reg, depth + 4 + 4 * index as u32)?;
        }

        for argument in arguments {
            self.regs.deallocate(argument);
        }

        if let Some(pointer) = pointer {
            self.regs.deallocate(pointer);
        }

        let data = self.regs.allocate();
        self.commit(Reg::T0, data)?;

        Ok(Value { ty: returns, data })
    }

    /// Materializa el valor de un operando.
    fn rvalue(&mut self, operand: Operand) -> Compile<Value> {
        let (ty, place) = match operand {
            Operand::Value(value) => return Ok(value),
            Operand::Place(ty, place) => (ty, place),
        };

        if ty.is_void() {
            return self.fail(CompileError::VoidValue);
        } else if ty.is_list() || ty.is_function() {
            let ty = ty.decay().or_else(|error| self.fail(error))?;
            let data = self.address(place)?;

            return Ok(Value { ty, data });
        }

        let opcode = if ty.is_char() { "lbu" } else { "lw" };
        let data = match place {
            Place::Global(name) => {
                let data = self.regs.allocate();
                let target = Self::target(data, Reg::T0);
                emit!(self, "la", "$t0, {}", name)?;
                emit!(self, opcode, "{}, 0($t0)", target)?;
                self.commit(target, data)?;

                data
            }

            Place::Frame(offset) => {
                let data = self.regs.allocate();
                let target = Self::target(data, Reg::T0);
                emit!(self, opcode, "{}, {}($sp)", target, offset)?;
                self.commit(target, data)?;

                data
            }

            Place::Indirect(address) => {
                let reg = self.load(address, Reg::T0)?;
                let target = Self::target(address, Reg::T0);
                emit!(self, opcode, "{}, 0({})", target, reg)?;
                self.commit(target, address)?;

                address
            }
        };

        Ok(Value { ty, data })
    }

    /// Materializa la dirección de un objeto.
    fn address(&mut self, place: Place) -> Compile<Data> {
        match place {
            Place::Global(name) => {
                let data = self.regs.allocate();
                let target = Self::target(data, Reg::T0);
                emit!(self, "la", "{}, {}", target, name)?;
                self.commit(target, data)?;

                Ok(data)
            }

            Place::Frame(offset) => {
                let data = self.regs.allocate();
                let target = Self::target(data, Reg::T0);
                emit!(self, "addi", "{}, $sp, {}", target, offset)?;
                self.commit(target, data)?;

                Ok(data)
            }

            Place::Indirect(address) => Ok(address),
        }
    }

    /// Escribe un valor en un objeto y libera la dirección, si la hubo.
    fn store(&mut self, place: Place, value: Data, ty: &Type) -> Compile<()> {
        let reg = self.load(value, Reg::T1)?;
        let opcode = if ty.is_char() { "sb" } else { "sw" };

        match place {
            Place::Global(name) => {
                emit!(self, "la", "$t0, {}", name)?;
                emit!(self, opcode, "{}, 0($t0)", reg)?;
            }

            Place::Frame(offset) => emit!(self, opcode, "{}, {}($sp)", reg, offset)?,

            Place::Indirect(address) => {
                let base = self.load(address, Reg::T0)?;
                emit!(self, opcode, "{}, 0({})", reg, base)?;
                self.regs.deallocate(address);
            }
        }

        Ok(())
    }

    /// Almacena un valor en una variable local.
    pub(super) fn store_local(&mut self, position: u32, ty: &Type, value: Data) -> Compile<()> {
        let offset = self.frame_offset(position, ty)?;
        self.store(Place::Frame(offset), value, ty)
    }

    fn require_value(&self, value: &Value) -> Compile<()> {
        if value.ty.is_void() {
            self.fail(CompileError::VoidValue)
        } else {
            Ok(())
        }
    }

    fn pointer_to(&self, ty: Type) -> Compile<Type> {
        ty.pointer_to().or_else(|error| self.fail(error))
    }
}
