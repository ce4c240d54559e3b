// bindings/python/src/lib.rs
// PyO3 wrapper for recordstore-core

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList, PyTuple};
use serde_json::Value;
use std::sync::OnceLock;

use recordstore_core::{
    FailurePolicy, MemoryStore, RecordStore, RecordStoreError, StoreConfig, RECORD_NUMBER_FIELD,
};

/// Backend shared by every RecordStore created from Python in this process
fn backend() -> &'static MemoryStore {
    static BACKEND: OnceLock<MemoryStore> = OnceLock::new();
    BACKEND.get_or_init(MemoryStore::new)
}

fn to_py_err(err: RecordStoreError) -> PyErr {
    if err.is_invalid_argument() {
        PyErr::new::<pyo3::exceptions::PyValueError, _>(err.to_string())
    } else {
        PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(err.to_string())
    }
}

/// CRUD operations for one collection
///
/// Example:
///     shelter = RecordStore(username="aacuser", password="...")
///     shelter.create({"name": "Rex", "animal_type": "Dog"})
///     shelter.read({"name": "Rex"})
#[pyclass(name = "RecordStore")]
pub struct PyRecordStore {
    core: RecordStore,
}

#[pymethods]
impl PyRecordStore {
    #[new]
    #[pyo3(signature = (username=None, password=None, host=None, port=None, database=None, collection=None, strict=false))]
    fn new(
        username: Option<String>,
        password: Option<String>,
        host: Option<String>,
        port: Option<u16>,
        database: Option<String>,
        collection: Option<String>,
        strict: bool,
    ) -> PyResult<Self> {
        let defaults = StoreConfig::default();
        let mut config = StoreConfig::new(
            username.unwrap_or(defaults.username),
            password.unwrap_or(defaults.password),
        );
        if let Some(host) = host {
            config = config.with_host(host);
        }
        if let Some(port) = port {
            config = config.with_port(port);
        }
        if let Some(database) = database {
            config = config.with_database(database);
        }
        if let Some(collection) = collection {
            config = config.with_collection(collection);
        }
        if strict {
            config = config.with_failure_policy(FailurePolicy::Strict);
        }

        let core = RecordStore::connect(config, backend()).map_err(to_py_err)?;
        Ok(PyRecordStore { core })
    }

    /// Next record number that create() would assign
    fn next_record_number(&self) -> PyResult<i64> {
        self.core.next_record_number().map_err(to_py_err)
    }

    /// Insert a dict; adds "record_number" to the passed dict
    ///
    /// Returns:
    ///     bool - whether the store assigned an identity
    fn create(&self, data: &PyAny) -> PyResult<bool> {
        let mut value = argument_to_json(data)?;
        let created = self.core.create(&mut value).map_err(to_py_err)?;

        if let Ok(dict) = data.downcast::<PyDict>() {
            if let Some(number) = value.get(RECORD_NUMBER_FIELD) {
                dict.set_item(RECORD_NUMBER_FIELD, json_value_to_python(data.py(), number)?)?;
            }
        }

        Ok(created)
    }

    /// Documents matching query, as a list of dicts
    fn read(&self, query: &PyAny) -> PyResult<PyObject> {
        let query_json = argument_to_json(query)?;
        let documents = self.core.read(&query_json).map_err(to_py_err)?;

        let py = query.py();
        let py_list = PyList::empty(py);
        for document in documents {
            py_list.append(json_value_to_python(py, &Value::Object(document))?)?;
        }
        Ok(py_list.into())
    }

    /// Apply an update document to every match; returns modified count
    fn update(&self, query: &PyAny, update_data: &PyAny) -> PyResult<u64> {
        let query_json = argument_to_json(query)?;
        let update_json = argument_to_json(update_data)?;

        self.core.update(&query_json, &update_json).map_err(to_py_err)
    }

    /// Delete every match; returns deleted count
    fn delete(&self, query: &PyAny) -> PyResult<u64> {
        let query_json = argument_to_json(query)?;

        self.core.delete(&query_json).map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!("RecordStore('{}')", self.core.config())
    }
}

// ========== PYTHON <-> JSON CONVERSION HELPERS ==========

/// Top-level arguments must be dicts; anything else reaches the core as
/// null so it raises the operation's own ValueError.
fn argument_to_json(value: &PyAny) -> PyResult<Value> {
    if value.downcast::<PyDict>().is_ok() {
        python_to_json(value)
    } else {
        Ok(Value::Null)
    }
}

fn python_to_json(value: &PyAny) -> PyResult<Value> {
    if value.is_none() {
        Ok(Value::Null)
    } else if let Ok(b) = value.extract::<bool>() {
        Ok(Value::Bool(b))
    } else if let Ok(i) = value.extract::<i64>() {
        Ok(Value::Number(i.into()))
    } else if let Ok(f) = value.extract::<f64>() {
        serde_json::Number::from_f64(f).map(Value::Number).ok_or_else(|| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("cannot store float {}", f))
        })
    } else if let Ok(s) = value.extract::<String>() {
        Ok(Value::String(s))
    } else if let Ok(list) = value.downcast::<PyList>() {
        let mut arr = Vec::with_capacity(list.len());
        for item in list.iter() {
            arr.push(python_to_json(item)?);
        }
        Ok(Value::Array(arr))
    } else if let Ok(tuple) = value.downcast::<PyTuple>() {
        let mut arr = Vec::with_capacity(tuple.len());
        for item in tuple.iter() {
            arr.push(python_to_json(item)?);
        }
        Ok(Value::Array(arr))
    } else if let Ok(dict) = value.downcast::<PyDict>() {
        let mut map = serde_json::Map::new();
        for (k, v) in dict.iter() {
            let key: String = k.extract()?;
            map.insert(key, python_to_json(v)?);
        }
        Ok(Value::Object(map))
    } else {
        Err(PyErr::new::<pyo3::exceptions::PyTypeError, _>(
            format!("Unsupported type: {}", value.get_type().name()?)
        ))
    }
}

fn json_value_to_python(py: Python, value: &Value) -> PyResult<PyObject> {
    match value {
        Value::Null => Ok(py.None()),
        Value::Bool(b) => Ok(b.into_py(py)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i.into_py(py))
            } else if let Some(f) = n.as_f64() {
                Ok(f.into_py(py))
            } else {
                Ok(py.None())
            }
        }
        Value::String(s) => Ok(s.into_py(py)),
        Value::Array(arr) => {
            let py_list = PyList::empty(py);
            for item in arr {
                py_list.append(json_value_to_python(py, item)?)?;
            }
            Ok(py_list.into())
        }
        Value::Object(map) => {
            let py_dict = PyDict::new(py);
            for (k, v) in map.iter() {
                py_dict.set_item(k, json_value_to_python(py, v)?)?;
            }
            Ok(py_dict.into())
        }
    }
}

#[pymodule]
fn recordstore(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyRecordStore>()?;
    log::debug!("recordstore module initialised");
    Ok(())
}
