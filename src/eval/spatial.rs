//! Spatial and vector builtins.

use crate::model::{Point, Value};
use crate::{Error, Result};

/// Dispatch a spatial/vector builtin by lowercased name.
pub fn call(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "point" => construct_point(args),
        "distance" | "point.distance" => match (args.first(), args.get(1)) {
            (Some(Value::Point(a)), Some(Value::Point(b))) => {
                if a.srid != b.srid {
                    return Err(Error::TypeError {
                        expected: "two points with the same SRID".into(),
                        got: format!("{} and {}", a.srid, b.srid),
                    });
                }
                Ok(Value::Float(distance(a, b)))
            }
            (Some(Value::Null), _) | (_, Some(Value::Null)) => Ok(Value::Null),
            _ => Err(wrong(name, args)),
        },
        "withinbbox" | "point.withinbbox" => {
            match (args.first(), args.get(1), args.get(2)) {
                (Some(Value::Point(p)), Some(Value::Point(lower)), Some(Value::Point(upper))) => {
                    Ok(Value::Bool(
                        p.x >= lower.x && p.x <= upper.x && p.y >= lower.y && p.y <= upper.y,
                    ))
                }
                (Some(Value::Null), _, _) => Ok(Value::Null),
                _ => Err(wrong(name, args)),
            }
        }
        "vector.similarity.cosine" => {
            let (a, b) = vector_pair(name, args)?;
            let dot: f64 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
            let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
            let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                return Ok(Value::Float(0.0));
            }
            Ok(Value::Float(dot / (norm_a * norm_b)))
        }
        "vector.similarity.euclidean" => {
            let (a, b) = vector_pair(name, args)?;
            let dist: f64 = a
                .iter()
                .zip(&b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt();
            // Similarity in (0, 1]: identical vectors score 1
            Ok(Value::Float(1.0 / (1.0 + dist)))
        }
        _ => Ok(Value::Null),
    }
}

fn wrong(name: &str, args: &[Value]) -> Error {
    Error::TypeError {
        expected: format!("valid arguments for {name}()"),
        got: args.iter().map(|v| v.type_name()).collect::<Vec<_>>().join(", "),
    }
}

fn construct_point(args: &[Value]) -> Result<Value> {
    let Some(Value::Map(map)) = args.first() else {
        return match args.first() {
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong("point", args)),
        };
    };
    let get = |key: &str| map.get(key).and_then(Value::as_float);

    if let (Some(lon), Some(lat)) = (get("longitude"), get("latitude")) {
        let mut point = Point::wgs84(lon, lat);
        point.z = get("height");
        return Ok(Value::Point(point));
    }
    if let (Some(x), Some(y)) = (get("x"), get("y")) {
        let srid = map
            .get("srid")
            .and_then(Value::as_int)
            .map(|s| s as i32)
            .unwrap_or(Point::SRID_CARTESIAN);
        return Ok(Value::Point(Point { srid, x, y, z: get("z") }));
    }
    Err(wrong("point", args))
}

fn distance(a: &Point, b: &Point) -> f64 {
    if a.srid == Point::SRID_WGS84 {
        return haversine_meters(a, b);
    }
    let dz = match (a.z, b.z) {
        (Some(az), Some(bz)) => az - bz,
        _ => 0.0,
    };
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2) + dz.powi(2)).sqrt()
}

fn haversine_meters(a: &Point, b: &Point) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let (lon1, lat1) = (a.x.to_radians(), a.y.to_radians());
    let (lon2, lat2) = (b.x.to_radians(), b.y.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

fn vector_pair(name: &str, args: &[Value]) -> Result<(Vec<f64>, Vec<f64>)> {
    let (Some(a), Some(b)) = (
        args.first().and_then(Value::as_f64_vec),
        args.get(1).and_then(Value::as_f64_vec),
    ) else {
        return Err(wrong(name, args));
    };
    if a.len() != b.len() {
        return Err(Error::TypeError {
            expected: "two vectors of equal dimension".into(),
            got: format!("{} and {}", a.len(), b.len()),
        });
    }
    Ok((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn point_map(x: f64, y: f64) -> Value {
        let map: HashMap<String, Value> =
            [("x".to_string(), Value::Float(x)), ("y".to_string(), Value::Float(y))]
                .into_iter()
                .collect();
        Value::Map(map)
    }

    #[test]
    fn test_point_construction() {
        match call("point", &[point_map(3.0, 4.0)]).unwrap() {
            Value::Point(p) => {
                assert_eq!(p.x, 3.0);
                assert_eq!(p.y, 4.0);
                assert_eq!(p.srid, Point::SRID_CARTESIAN);
            }
            other => panic!("expected point, got {other:?}"),
        }
    }

    #[test]
    fn test_cartesian_distance() {
        let a = call("point", &[point_map(0.0, 0.0)]).unwrap();
        let b = call("point", &[point_map(3.0, 4.0)]).unwrap();
        assert_eq!(call("distance", &[a, b]).unwrap(), Value::Float(5.0));
    }

    #[test]
    fn test_within_bbox() {
        let p = call("point", &[point_map(2.0, 2.0)]).unwrap();
        let ll = call("point", &[point_map(0.0, 0.0)]).unwrap();
        let ur = call("point", &[point_map(5.0, 5.0)]).unwrap();
        assert_eq!(call("withinbbox", &[p, ll, ur]).unwrap(), Value::Bool(true));

        let outside = call("point", &[point_map(9.0, 2.0)]).unwrap();
        let ll = call("point", &[point_map(0.0, 0.0)]).unwrap();
        let ur = call("point", &[point_map(5.0, 5.0)]).unwrap();
        assert_eq!(call("withinbbox", &[outside, ll, ur]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_cosine_similarity() {
        let a = Value::List(vec![Value::Float(1.0), Value::Float(0.0)]);
        let b = Value::List(vec![Value::Float(1.0), Value::Float(0.0)]);
        assert_eq!(call("vector.similarity.cosine", &[a, b]).unwrap(), Value::Float(1.0));

        let a = Value::List(vec![Value::Float(1.0), Value::Float(0.0)]);
        let c = Value::List(vec![Value::Float(0.0), Value::Float(1.0)]);
        assert_eq!(call("vector.similarity.cosine", &[a, c]).unwrap(), Value::Float(0.0));
    }

    #[test]
    fn test_euclidean_similarity() {
        let a = Value::List(vec![Value::Float(1.0), Value::Float(2.0)]);
        let b = Value::List(vec![Value::Float(1.0), Value::Float(2.0)]);
        assert_eq!(call("vector.similarity.euclidean", &[a, b]).unwrap(), Value::Float(1.0));
    }

    #[test]
    fn test_dimension_mismatch_errors() {
        let a = Value::List(vec![Value::Float(1.0)]);
        let b = Value::List(vec![Value::Float(1.0), Value::Float(2.0)]);
        assert!(call("vector.similarity.cosine", &[a, b]).is_err());
    }
}
