//! Standard built-in functions available to every expression.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::value::{cast, Color, Function, ValueKind, Variant};

/// The standard function table.
pub fn standard() -> HashMap<String, Function> {
    let functions = [
        Function::new("min", |args| extreme("min", args, |a, b| b < a)),
        Function::new("max", |args| extreme("max", args, |a, b| b > a)),
        Function::new("abs", abs),
        Function::new("floor", |args| rounding("floor", args, f64::floor)),
        Function::new("ceil", |args| rounding("ceil", args, f64::ceil)),
        Function::new("round", |args| rounding("round", args, f64::round)),
        Function::new("len", len),
        Function::new("str", |args| {
            arity("str", args, 1)?;
            Ok(Variant::Str(args[0].to_text()))
        }),
        Function::new("int", to_int),
        Function::new("float", to_float),
        Function::new("rgb", rgb),
        Function::new("rgba", rgba),
    ];
    functions
        .into_iter()
        .map(|f| (f.name().to_owned(), f))
        .collect()
}

fn arity(name: &str, args: &[Variant], expected: usize) -> Result<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(Error::script(format!(
            "{name}() takes {expected} argument(s), got {}",
            args.len()
        )))
    }
}

fn number(name: &str, value: &Variant) -> Result<f64> {
    value.as_float().ok_or_else(|| {
        Error::script(format!(
            "{name}() expects numbers, got {}",
            value.kind_name()
        ))
    })
}

/// `min`/`max`: integral when every argument is an int.
fn extreme(name: &str, args: &[Variant], better: fn(f64, f64) -> bool) -> Result<Variant> {
    let Some(first) = args.first() else {
        return Err(Error::script(format!("{name}() needs at least one argument")));
    };
    let mut best = first;
    let mut best_value = number(name, first)?;
    for arg in &args[1..] {
        let value = number(name, arg)?;
        if better(best_value, value) {
            best = arg;
            best_value = value;
        }
    }
    if args.iter().all(|a| matches!(a, Variant::Int(_))) {
        Ok(best.clone())
    } else {
        Ok(Variant::Float(best_value))
    }
}

fn abs(args: &[Variant]) -> Result<Variant> {
    arity("abs", args, 1)?;
    match &args[0] {
        Variant::Int(i) => i
            .checked_abs()
            .map(Variant::Int)
            .ok_or_else(|| Error::script("integer overflow")),
        other => Ok(Variant::Float(number("abs", other)?.abs())),
    }
}

fn rounding(name: &str, args: &[Variant], round: fn(f64) -> f64) -> Result<Variant> {
    arity(name, args, 1)?;
    match &args[0] {
        Variant::Int(_) => Ok(args[0].clone()),
        other => cast(Variant::Float(round(number(name, other)?)), &ValueKind::Int),
    }
}

fn len(args: &[Variant]) -> Result<Variant> {
    arity("len", args, 1)?;
    let n = match &args[0] {
        Variant::Str(s) => s.chars().count(),
        Variant::List(items) => items.len(),
        Variant::Record(fields) => fields.len(),
        other => {
            return Err(Error::script(format!(
                "len() expects a string, list or record, got {}",
                other.kind_name()
            )))
        }
    };
    i64::try_from(n)
        .map(Variant::Int)
        .map_err(|_| Error::script("length out of range"))
}

fn to_int(args: &[Variant]) -> Result<Variant> {
    arity("int", args, 1)?;
    match &args[0] {
        Variant::Str(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Variant::Int(i));
            }
            s.parse::<f64>()
                .map_err(|_| Error::script(format!("int(): cannot parse {s:?}")))
                .and_then(|f| cast(Variant::Float(f), &ValueKind::Int))
        }
        other => cast(other.clone(), &ValueKind::Int),
    }
}

fn to_float(args: &[Variant]) -> Result<Variant> {
    arity("float", args, 1)?;
    match &args[0] {
        Variant::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Variant::Float)
            .map_err(|_| Error::script(format!("float(): cannot parse {s:?}"))),
        other => cast(other.clone(), &ValueKind::Float),
    }
}

fn channel(name: &str, value: &Variant) -> Result<u8> {
    match value {
        Variant::Int(i) => u8::try_from(*i)
            .map_err(|_| Error::script(format!("{name}(): channel {i} outside 0..=255"))),
        other => Err(Error::script(format!(
            "{name}() expects int channels, got {}",
            other.kind_name()
        ))),
    }
}

fn rgb(args: &[Variant]) -> Result<Variant> {
    arity("rgb", args, 3)?;
    Ok(Variant::Color(Color::rgb(
        channel("rgb", &args[0])?,
        channel("rgb", &args[1])?,
        channel("rgb", &args[2])?,
    )))
}

/// `rgba(r, g, b, a)`: alpha is a float in `0.0..=1.0` or an int channel.
fn rgba(args: &[Variant]) -> Result<Variant> {
    arity("rgba", args, 4)?;
    let alpha = match &args[3] {
        Variant::Float(a) if (0.0..=1.0).contains(a) => (a * 255.0).round() as u8,
        Variant::Float(a) => {
            return Err(Error::script(format!("rgba(): alpha {a} outside 0.0..=1.0")))
        }
        other => channel("rgba", other)?,
    };
    Ok(Variant::Color(Color::rgba(
        channel("rgba", &args[0])?,
        channel("rgba", &args[1])?,
        channel("rgba", &args[2])?,
        alpha,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Variant]) -> Result<Variant> {
        standard()[name].call(args)
    }

    #[test]
    fn min_max_keep_ints() {
        assert_eq!(call("min", &[3.into(), 1.into(), 2.into()]).unwrap(), Variant::Int(1));
        assert_eq!(call("max", &[3.into(), 4.5.into()]).unwrap(), Variant::Float(4.5));
        assert!(call("max", &[]).is_err());
    }

    #[test]
    fn rounding_returns_ints() {
        assert_eq!(call("floor", &[2.7.into()]).unwrap(), Variant::Int(2));
        assert_eq!(call("ceil", &[2.1.into()]).unwrap(), Variant::Int(3));
        assert_eq!(call("round", &[(-2.5).into()]).unwrap(), Variant::Int(-3));
    }

    #[test]
    fn conversions() {
        assert_eq!(call("int", &["42".into()]).unwrap(), Variant::Int(42));
        assert_eq!(call("int", &["4.9".into()]).unwrap(), Variant::Int(4));
        assert_eq!(call("float", &[2.into()]).unwrap(), Variant::Float(2.0));
        assert_eq!(call("str", &[1.5.into()]).unwrap(), Variant::from("1.5"));
        assert!(call("int", &["x".into()]).is_err());
    }

    #[test]
    fn len_of_collections() {
        assert_eq!(call("len", &["héllo".into()]).unwrap(), Variant::Int(5));
        assert_eq!(call("len", &[Variant::from(vec![1, 2])]).unwrap(), Variant::Int(2));
        assert!(call("len", &[1.into()]).is_err());
    }

    #[test]
    fn colors() {
        assert_eq!(
            call("rgb", &[255.into(), 0.into(), 0.into()]).unwrap(),
            Variant::Color(Color::rgb(255, 0, 0))
        );
        assert_eq!(
            call("rgba", &[0.into(), 0.into(), 0.into(), 0.5.into()]).unwrap(),
            Variant::Color(Color::rgba(0, 0, 0, 128))
        );
        assert!(call("rgb", &[256.into(), 0.into(), 0.into()]).is_err());
    }

    #[test]
    fn arity_is_checked() {
        let err = call("abs", &[]).unwrap_err();
        assert_eq!(err, Error::script("abs() takes 1 argument(s), got 0"));
    }
}
