use clap::Parser;
use geo_dissolve::Merger;
use geojson::GeoJson;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input GeoJSON file (Polygon/MultiPolygon features)
    #[arg(short, long)]
    input: PathBuf,

    /// Output GeoJSON file (merged features)
    #[arg(short, long)]
    output: PathBuf,

    /// Coordinate tolerance for matching shared edges (default: exact)
    #[arg(long)]
    precision: Option<f64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Reading input from {:?}", args.input);
    let file = File::open(&args.input)?;
    let reader = BufReader::new(file);
    let geojson: GeoJson = serde_json::from_reader(reader)?;

    let mut merger = Merger::new();
    merger.coordinate_precision = args.precision;

    let mut feature_count = 0;
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in fc.features {
                if let Some(geom) = feature.geometry {
                    let geo_geom: geo_types::Geometry<f64> = geom.try_into()?;
                    merger.add_geometry(geo_geom);
                    feature_count += 1;
                }
            }
        }
        GeoJson::Feature(feature) => {
            if let Some(geom) = feature.geometry {
                let geo_geom: geo_types::Geometry<f64> = geom.try_into()?;
                merger.add_geometry(geo_geom);
                feature_count += 1;
            }
        }
        GeoJson::Geometry(geom) => {
            let geo_geom: geo_types::Geometry<f64> = geom.try_into()?;
            merger.add_geometry(geo_geom);
            feature_count += 1;
        }
    }
    println!("Merging {} features", feature_count);

    let output = merger.merge()?;
    println!("Produced {} merged features", output.features.len());
    for failure in &output.failures {
        eprintln!("Group {:?} failed: {}", failure.members, failure.reason);
    }

    let fc = output.to_feature_collection();
    let out_file = File::create(&args.output)?;
    let writer = BufWriter::new(out_file);
    serde_json::to_writer(writer, &fc)?;
    println!("Wrote {:?}", args.output);

    Ok(())
}
