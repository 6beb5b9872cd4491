use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name) VALUES (?1, ?2)",
        params![patient.id.to_string(), patient.name],
    )?;
    Ok(())
}

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, name, specialty) VALUES (?1, ?2, ?3)",
        params![doctor.id.to_string(), doctor.name, doctor.specialty],
    )?;
    Ok(())
}

pub fn insert_nurse(conn: &Connection, nurse: &Nurse) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO nurses (id, name) VALUES (?1, ?2)",
        params![nurse.id.to_string(), nurse.name],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, name FROM patients WHERE id = ?1",
            params![id.to_string()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    row.map(|(id, name)| {
        Ok(Patient {
            id: parse_uuid(&id)?,
            name,
        })
    })
    .transpose()
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, name, specialty FROM doctors WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, name, specialty)| {
        Ok(Doctor {
            id: parse_uuid(&id)?,
            name,
            specialty,
        })
    })
    .transpose()
}

pub fn get_nurse(conn: &Connection, id: &Uuid) -> Result<Option<Nurse>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, name FROM nurses WHERE id = ?1",
            params![id.to_string()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    row.map(|(id, name)| {
        Ok(Nurse {
            id: parse_uuid(&id)?,
            name,
        })
    })
    .transpose()
}
