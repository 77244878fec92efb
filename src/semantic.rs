//! Tablas de símbolos.

use std::collections::{hash_map::Entry, HashMap};

use crate::types::Type;

/// Una variable o función declarada.
#[derive(Clone, Debug)]
pub struct Variable {
    pub ty: Type,
    pub storage: Storage,
}

/// Forma de acceso a una variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Storage {
    /// Datos globales bajo una etiqueta con el mismo nombre.
    Global,

    /// Función, posiblemente solo prototipada. La cantidad de
    /// argumentos se obtiene de la firma en el tipo.
    Callable { defined: bool },

    /// Variable local o parámetro en la posición indicada del marco.
    Local { position: u32 },
}

/// Una tabla de símbolos con un único alcance.
#[derive(Default, Debug)]
pub struct SymbolTable {
    symbols: HashMap<String, Variable>,
}

impl SymbolTable {
    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.symbols.get(name)
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.symbols.get_mut(name)
    }

    /// Inserta una variable, reemplazando cualquier definición previa.
    pub fn insert(&mut self, name: String, variable: Variable) {
        self.symbols.insert(name, variable);
    }

    /// Inserta una variable que no debe existir aún.
    ///
    /// En caso de duplicado se devuelve la variable rechazada.
    pub fn define(&mut self, name: String, variable: Variable) -> Result<(), Variable> {
        match self.symbols.entry(name) {
            Entry::Vacant(entry) => {
                entry.insert(variable);
                Ok(())
            }

            Entry::Occupied(_) => Err(variable),
        }
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Los dos alcances del programa.
///
/// El global persiste durante toda la compilación; el local se
/// vacía al iniciar cada función.
#[derive(Default, Debug)]
pub struct Scopes {
    pub global: SymbolTable,
    pub local: SymbolTable,
}

impl Scopes {
    /// Busca un nombre, primero en el alcance local.
    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.local.lookup(name).or_else(|| self.global.lookup(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(position: u32) -> Variable {
        Variable {
            ty: Type::int(),
            storage: Storage::Local { position },
        }
    }

    #[test]
    fn define_rejects_duplicates() {
        let mut table = SymbolTable::default();
        assert!(table.define("x".into(), local(0)).is_ok());

        let rejected = table.define("x".into(), local(4)).unwrap_err();
        assert_eq!(rejected.storage, Storage::Local { position: 4 });
        assert_eq!(table.lookup("x").unwrap().storage, Storage::Local { position: 0 });
    }

    #[test]
    fn insert_overwrites() {
        let mut table = SymbolTable::default();
        let prototype = Variable {
            ty: Type::int(),
            storage: Storage::Callable { defined: false },
        };

        table.insert("f".into(), prototype.clone());
        table.insert(
            "f".into(),
            Variable {
                storage: Storage::Callable { defined: true },
                ..prototype
            },
        );

        assert_eq!(table.len(), 1);
        assert!(matches!(
            table.lookup("f").unwrap().storage,
            Storage::Callable { defined: true }
        ));
    }

    #[test]
    fn locals_shadow_globals() {
        let mut scopes = Scopes::default();
        scopes.global.insert(
            "x".into(),
            Variable {
                ty: Type::char(),
                storage: Storage::Global,
            },
        );

        assert_eq!(scopes.lookup("x").unwrap().storage, Storage::Global);

        scopes.local.insert("x".into(), local(8));
        assert_eq!(scopes.lookup("x").unwrap().storage, Storage::Local { position: 8 });

        scopes.local.clear();
        assert!(scopes.local.is_empty());
        assert_eq!(scopes.lookup("x").unwrap().storage, Storage::Global);
        assert!(scopes.lookup("y").is_none());
    }
}
